#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;

use custodian::mock::{MockMainLedger, MockSideLedger};
use custodian::{Custodian, CustodianConfig};
use persistence::Store;
use programs::log::{Item, FINALIZE_CODE, INPUT_CODE, LOG_CODE, OUTPUT_CODE};
use types::account::Address;
use types::amount::ONE;
use types::asset::Asset;
use types::ids::TxId;
use types::pegout::PegOut;
use types::xdr::XdrEncode;

pub const MAIN_KEY: [u8; 32] = [7; 32];
pub const SIDE_KEY: [u8; 32] = [8; 32];

pub struct Harness {
    pub custodian: Arc<Custodian>,
    pub main: Arc<MockMainLedger>,
    pub side: Arc<MockSideLedger>,
    pub store: Arc<Store>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn test_config() -> CustodianConfig {
    CustodianConfig {
        backoff_base_ms: 5,
        backoff_max_ms: 20,
        retry_interval_secs: 1,
        ..CustodianConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with_store(Arc::new(Store::open_in_memory().unwrap()))
}

pub fn harness_with_store(store: Arc<Store>) -> Harness {
    init_tracing();
    let main = Arc::new(MockMainLedger::new());
    let side = Arc::new(MockSideLedger::new());
    let custodian = Custodian::new(
        test_config(),
        store.clone(),
        main.clone(),
        side.clone(),
        SigningKey::from_bytes(&MAIN_KEY),
        SigningKey::from_bytes(&SIDE_KEY),
    )
    .unwrap();
    Harness {
        custodian: Arc::new(custodian),
        main,
        side,
        store,
    }
}

pub fn exporter_key() -> SigningKey {
    SigningKey::from_bytes(&[21; 32])
}

/// Payload of a 50-unit native export by `exporter_key()`.
pub fn native_pegout(seqnum: i64) -> PegOut {
    let exporter = exporter_key().verifying_key();
    PegOut {
        asset: Asset::Native.to_xdr(),
        temp: Address::from_public_key([22; 32]).to_string(),
        seqnum,
        exporter: Address::from_verifying_key(&exporter).to_string(),
        amount: 50 * ONE,
        anchor: vec![0xab; 32],
        pubkey: exporter.to_bytes().to_vec(),
    }
}

/// Record an export for `pegout` and return its id.
pub fn record_export(store: &Store, id: u8, pegout: &PegOut) -> TxId {
    let txid = TxId::new([id; 32]);
    assert!(store
        .insert_export(&txid, pegout.to_json().unwrap().as_bytes())
        .unwrap());
    txid
}

fn entry(code: u8, rest: Vec<Vec<u8>>) -> Vec<Item> {
    let mut t = vec![Item::Bytes(vec![code])];
    t.extend(rest.into_iter().map(Item::Bytes));
    t
}

/// Log of an export transaction into the contract with `seed`.
pub fn export_log(seed: &[u8; 32], payload: &[u8]) -> Vec<Vec<Item>> {
    vec![
        entry(INPUT_CODE, vec![vec![1; 32]]),
        entry(LOG_CODE, vec![vec![2; 32], payload.to_vec()]),
        entry(LOG_CODE, vec![seed.to_vec(), Vec::new()]),
        entry(OUTPUT_CODE, vec![vec![3; 32]]),
        entry(FINALIZE_CODE, vec![]),
    ]
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
