//! Peg-In Watcher Tests
//!
//! - A hash-memo payment to the custodian marks its peg observed exactly once
//! - Other memos, other destinations and unknown pegs change nothing
//! - Operations the custodian does not interpret are skipped, not fatal
//! - The cursor is persisted and a restarted watcher resumes after it
//! - Stream failures reconnect from the persisted cursor
//! - Undecodable envelopes are fatal

mod common;

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::*;
use custodian::ledger::StreamedTx;
use custodian::pegin_watcher::{handle_pegin_tx, watch_pegins};
use custodian::CustodianError;
use persistence::Store;
use types::account::Address;
use types::amount::ONE;
use types::asset::Asset;
use types::ids::{Cursor, NonceHash};
use types::transaction::{
    Memo, Operation, OperationBody, OperationKind, SignedTransaction, Transaction,
};
use types::xdr::XdrEncode;

fn payer() -> SigningKey {
    SigningKey::from_bytes(&[31; 32])
}

fn pegin_tx(h: &Harness, memo: Memo, destination: Address, amount: i64) -> SignedTransaction {
    let payer = payer();
    Transaction {
        source: Address::from_verifying_key(&payer.verifying_key()),
        fee: 100,
        seq_num: 1,
        memo,
        operations: vec![Operation::payment(None, destination, Asset::Native, amount)],
    }
    .sign(h.custodian.network(), &[&payer])
}

fn streamed(token: &str, tx: &SignedTransaction) -> StreamedTx {
    StreamedTx {
        paging_token: Cursor::new(token),
        envelope_xdr: tx.to_xdr(),
    }
}

fn pending_peg(store: &Store, id: u8) -> NonceHash {
    let nh = NonceHash::new([id; 32]);
    assert!(store.insert_peg(&nh, 0, &[], &[9; 32]).unwrap());
    nh
}

#[tokio::test]
async fn test_pegin_observed_once_under_duplicate_delivery() {
    let h = harness();
    let nh = pending_peg(&h.store, 1);
    let tx = pegin_tx(&h, Memo::Hash(*nh.as_bytes()), h.custodian.account, 50 * ONE);
    let mut imports = h.custodian.signals.imports.subscribe();

    let first = handle_pegin_tx(&h.custodian, &streamed("1", &tx)).unwrap();
    assert_eq!(first, vec![nh]);
    let again = handle_pegin_tx(&h.custodian, &streamed("1", &tx)).unwrap();
    assert!(again.is_empty());

    let peg = h.store.peg(&nh).unwrap().unwrap();
    assert!(peg.observed_on_main);
    assert_eq!(peg.amount, Some(50 * ONE));
    assert_eq!(peg.asset_xdr, Some(Asset::Native.to_xdr()));
    assert_eq!(h.store.cursor(h.custodian.seed()).unwrap().as_str(), "1");

    tokio::time::timeout(Duration::from_secs(1), imports.wait())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_non_hash_memo_is_ignored_but_cursor_advances() {
    let h = harness();
    let nh = pending_peg(&h.store, 2);
    let tx = pegin_tx(&h, Memo::Text("hello".into()), h.custodian.account, ONE);

    assert!(handle_pegin_tx(&h.custodian, &streamed("4", &tx)).unwrap().is_empty());
    assert!(!h.store.peg(&nh).unwrap().unwrap().observed_on_main);
    assert_eq!(h.store.cursor(h.custodian.seed()).unwrap().as_str(), "4");
}

#[tokio::test]
async fn test_payment_elsewhere_is_ignored() {
    let h = harness();
    let nh = pending_peg(&h.store, 3);
    let elsewhere = Address::from_public_key([44; 32]);
    let tx = pegin_tx(&h, Memo::Hash(*nh.as_bytes()), elsewhere, ONE);

    assert!(handle_pegin_tx(&h.custodian, &streamed("1", &tx)).unwrap().is_empty());
    assert!(!h.store.peg(&nh).unwrap().unwrap().observed_on_main);
}

#[tokio::test]
async fn test_unknown_nonce_is_not_an_error() {
    let h = harness();
    let tx = pegin_tx(&h, Memo::Hash([99; 32]), h.custodian.account, ONE);
    assert!(handle_pegin_tx(&h.custodian, &streamed("1", &tx)).unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_bundled_with_other_operations() {
    let h = harness();
    let nh = pending_peg(&h.store, 5);
    let payer = payer();
    let bump = Operation {
        source: None,
        body: OperationBody::Other {
            kind: OperationKind::BumpSequence,
            body: 1000i64.to_be_bytes().to_vec(),
        },
    };
    let tx = Transaction {
        source: Address::from_verifying_key(&payer.verifying_key()),
        fee: 200,
        seq_num: 1,
        memo: Memo::Hash(*nh.as_bytes()),
        operations: vec![
            bump,
            Operation::payment(None, h.custodian.account, Asset::Native, ONE),
        ],
    }
    .sign(h.custodian.network(), &[&payer]);

    let observed = handle_pegin_tx(&h.custodian, &streamed("1", &tx)).unwrap();
    assert_eq!(observed, vec![nh]);
    assert!(h.store.peg(&nh).unwrap().unwrap().observed_on_main);
    assert_eq!(h.store.cursor(h.custodian.seed()).unwrap().as_str(), "1");
}

#[tokio::test]
async fn test_undecodable_envelope_is_fatal() {
    let h = harness();
    let bad = StreamedTx {
        paging_token: Cursor::new("1"),
        envelope_xdr: vec![1, 2, 3],
    };
    let err = handle_pegin_tx(&h.custodian, &bad).unwrap_err();
    assert!(matches!(err, CustodianError::Invariant(_)));
    assert!(h.store.cursor(h.custodian.seed()).unwrap().is_start());
}

#[tokio::test]
async fn test_watcher_resumes_from_persisted_cursor() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custodian.db");

    let first_tx;
    let second_nh;
    {
        let h = harness_with_store(Arc::new(Store::open(&path).unwrap()));
        let nh = pending_peg(&h.store, 5);
        second_nh = pending_peg(&h.store, 6);
        first_tx = pegin_tx(&h, Memo::Hash(*nh.as_bytes()), h.custodian.account, ONE);
        h.main.push_transaction(h.custodian.account, &first_tx);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(watch_pegins(h.custodian.clone(), cancel.clone()));
        let store = h.store.clone();
        eventually("first peg observed", || {
            store.peg(&nh).unwrap().unwrap().observed_on_main
        })
        .await;
        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    let h = harness_with_store(Arc::new(Store::open(&path).unwrap()));
    assert_eq!(h.store.cursor(h.custodian.seed()).unwrap().as_str(), "1");
    h.main.push_transaction(h.custodian.account, &first_tx);
    let second_tx = pegin_tx(&h, Memo::Hash(*second_nh.as_bytes()), h.custodian.account, 2 * ONE);
    h.main.push_transaction(h.custodian.account, &second_tx);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(watch_pegins(h.custodian.clone(), cancel.clone()));
    let store = h.store.clone();
    eventually("second peg observed", || {
        store.peg(&second_nh).unwrap().unwrap().observed_on_main
    })
    .await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    assert_eq!(h.main.stream_opens()[0].as_str(), "1");
    assert_eq!(h.store.cursor(h.custodian.seed()).unwrap().as_str(), "2");
}

#[tokio::test]
async fn test_stream_failure_reconnects() {
    let h = harness();
    let nh = pending_peg(&h.store, 7);
    h.main.fail_next_streams(2);
    let tx = pegin_tx(&h, Memo::Hash(*nh.as_bytes()), h.custodian.account, ONE);
    h.main.push_transaction(h.custodian.account, &tx);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(watch_pegins(h.custodian.clone(), cancel.clone()));
    let store = h.store.clone();
    eventually("peg observed after reconnect", || {
        store.peg(&nh).unwrap().unwrap().observed_on_main
    })
    .await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    assert!(h.main.stream_opens().len() >= 3);
}

#[tokio::test]
async fn test_watcher_stops_on_fatal_envelope() {
    let h = harness();
    h.main.push_raw(h.custodian.account, vec![0xff; 3]);
    let result = watch_pegins(h.custodian.clone(), CancellationToken::new()).await;
    assert!(matches!(result, Err(CustodianError::Invariant(_))));
}
