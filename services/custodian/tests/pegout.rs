//! Peg-Out Engine Tests
//!
//! - A recorded export produces exactly one pre-authorized peg-out transaction
//! - Submission outcomes map to ok, retry and fail
//! - Terminal records are forwarded to the finalizer and never resubmitted
//! - Corrupt records stop the engine
//! - Exporter-side construction: the pre-authorized hash matches what the engine submits

mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::*;
use custodian::export_tx::{
    build_export_tx, build_pegout_tx, submit_pre_export_tx, ExportRequest, PreExport,
    TEMP_ACCOUNT_BALANCE,
};
use custodian::export_watcher::ExportWatcher;
use custodian::ledger::{Block, BlockTx, SubmitError};
use custodian::pegout::{process_pending, run_pegout_engine};
use custodian::pin::BlockHandler;
use custodian::CustodianError;
use programs::opcodes::{decode, Instruction};
use types::account::Address;
use types::amount::ONE;
use types::asset::Asset;
use types::ids::TxId;
use types::pegout::{PegOut, PegOutState};
use types::transaction::{
    Operation, OperationBody, SetOptions, SignerKey, TransactionResultCode,
};

fn state_of(h: &Harness, txid: &TxId) -> PegOutState {
    h.store.export(txid).unwrap().unwrap().decode().unwrap().state
}

#[tokio::test]
async fn test_native_pegout_end_to_end() {
    let h = harness();
    let pegout = native_pegout(1000);
    let txid = record_export(&h.store, 1, &pegout);
    let (tx, mut rx) = mpsc::channel(8);

    let retry_pending = process_pending(&h.custodian, &tx).await.unwrap();
    assert!(!retry_pending);

    let submitted = h.main.submitted();
    assert_eq!(submitted.len(), 1);
    let env = &submitted[0];
    let exporter = pegout.exporter_address().unwrap();
    assert_eq!(env.tx.source, pegout.temp_address().unwrap());
    assert_eq!(env.tx.seq_num, 1001);
    assert_eq!(env.tx.fee, 200);
    assert_eq!(
        env.tx.operations,
        vec![
            Operation::account_merge(exporter),
            Operation::payment(Some(h.custodian.account), exporter, Asset::Native, 50 * ONE),
        ]
    );
    assert!(env.is_signed_by(h.custodian.network(), &h.custodian.main_key.verifying_key()));

    assert_eq!(state_of(&h, &txid), PegOutState::Ok);
    assert_eq!(rx.recv().await, Some(txid));
}

#[tokio::test]
async fn test_bad_seq_retries_then_succeeds() {
    let h = harness();
    let txid = record_export(&h.store, 2, &native_pegout(10));
    let (tx, mut rx) = mpsc::channel(8);
    h.main.script_submit(Err(SubmitError::Rejected {
        code: TransactionResultCode::TxBadSeq,
    }));

    assert!(process_pending(&h.custodian, &tx).await.unwrap());
    assert_eq!(state_of(&h, &txid), PegOutState::Retry);
    assert!(rx.try_recv().is_err());

    assert!(!process_pending(&h.custodian, &tx).await.unwrap());
    assert_eq!(state_of(&h, &txid), PegOutState::Ok);
    assert_eq!(h.main.submitted().len(), 2);
    assert_eq!(rx.recv().await, Some(txid));
}

#[tokio::test]
async fn test_repeated_bad_seq_stays_in_retry() {
    let h = harness();
    let txid = record_export(&h.store, 3, &native_pegout(10));
    let (tx, _rx) = mpsc::channel(8);
    for _ in 0..2 {
        h.main.script_submit(Err(SubmitError::Rejected {
            code: TransactionResultCode::TxBadSeq,
        }));
    }
    assert!(process_pending(&h.custodian, &tx).await.unwrap());
    assert!(process_pending(&h.custodian, &tx).await.unwrap());
    assert_eq!(state_of(&h, &txid), PegOutState::Retry);
}

#[tokio::test]
async fn test_rejection_and_transport_errors_fail() {
    let h = harness();
    let rejected = record_export(&h.store, 4, &native_pegout(10));
    let unreachable = record_export(&h.store, 5, &native_pegout(20));
    let (tx, mut rx) = mpsc::channel(8);
    h.main.script_submit(Err(SubmitError::Rejected {
        code: TransactionResultCode::TxFailed,
    }));
    h.main
        .script_submit(Err(SubmitError::Transport("connection reset".into())));

    assert!(!process_pending(&h.custodian, &tx).await.unwrap());
    assert_eq!(state_of(&h, &rejected), PegOutState::Fail);
    assert_eq!(state_of(&h, &unreachable), PegOutState::Fail);
    assert_eq!(rx.recv().await, Some(rejected));
    assert_eq!(rx.recv().await, Some(unreachable));
}

#[tokio::test]
async fn test_terminal_records_are_not_resubmitted() {
    let h = harness();
    record_export(&h.store, 6, &native_pegout(10));
    let (tx, _rx) = mpsc::channel(8);

    process_pending(&h.custodian, &tx).await.unwrap();
    process_pending(&h.custodian, &tx).await.unwrap();
    assert_eq!(h.main.submitted().len(), 1);
}

#[tokio::test]
async fn test_corrupt_record_is_fatal() {
    let h = harness();
    h.store.insert_export(&TxId::new([7; 32]), b"{}").unwrap();
    let (tx, _rx) = mpsc::channel(8);
    let err = process_pending(&h.custodian, &tx).await.unwrap_err();
    assert!(matches!(err, CustodianError::Invariant(_)));
    assert!(h.main.submitted().is_empty());
}

#[tokio::test]
async fn test_overflowing_sequence_is_an_error_not_a_panic() {
    let h = harness();
    // bypasses the watcher's validation, as a damaged store would
    let txid = record_export(&h.store, 8, &native_pegout(i64::MAX));
    let (tx, _rx) = mpsc::channel(8);
    let err = process_pending(&h.custodian, &tx).await.unwrap_err();
    assert!(matches!(err, CustodianError::Invariant(ref m) if m.contains("sequence")));
    assert!(h.main.submitted().is_empty());
    assert_eq!(state_of(&h, &txid), PegOutState::NotYet);
}

#[tokio::test]
async fn test_engine_wakes_on_export_signal() {
    let h = harness();
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_pegout_engine(h.custodian.clone(), tx, cancel.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let txid = record_export(&h.store, 8, &native_pegout(10));
    h.custodian.signals.exports.notify();
    let got = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(got, Some(txid));

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_engine_retries_on_timer() {
    let h = harness();
    let txid = record_export(&h.store, 9, &native_pegout(10));
    h.main.script_submit(Err(SubmitError::Rejected {
        code: TransactionResultCode::TxBadSeq,
    }));
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_pegout_engine(h.custodian.clone(), tx, cancel.clone()));

    let got = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await.unwrap();
    assert_eq!(got, Some(txid));
    assert_eq!(state_of(&h, &txid), PegOutState::Ok);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

/// The JSON payload pushed by an export program.
fn payload_of(program: &[u8]) -> Vec<u8> {
    decode(program)
        .unwrap()
        .into_iter()
        .find_map(|ins| match ins {
            Instruction::Push(bytes) if PegOut::from_json(&bytes).is_ok() => Some(bytes),
            _ => None,
        })
        .unwrap()
}

#[tokio::test]
async fn test_exporter_flow_matches_engine_pegout() {
    let h = harness();
    let exporter_key = exporter_key();
    let exporter = Address::from_verifying_key(&exporter_key.verifying_key());
    h.main.set_sequence(exporter, 500);

    let pre = submit_pre_export_tx(
        h.main.as_ref(),
        h.custodian.network(),
        100,
        &exporter_key,
        h.custodian.account,
        Asset::Native,
        50 * ONE,
    )
    .await
    .unwrap();

    let sent = h.main.submitted();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].tx.seq_num, 501);
    assert_eq!(
        sent[0].tx.operations,
        vec![Operation::create_account(pre.temp, TEMP_ACCOUNT_BALANCE)]
    );
    assert_eq!(sent[1].tx.seq_num, 502);
    let preauth = build_pegout_tx(
        h.custodian.account,
        exporter,
        pre.temp,
        Asset::Native,
        50 * ONE,
        pre.seqnum,
        100,
    )
    .unwrap()
    .hash(h.custodian.network());
    match &sent[1].tx.operations[0].body {
        OperationBody::SetOptions(SetOptions {
            master_weight,
            low_threshold,
            signer: Some(signer),
            ..
        }) => {
            assert_eq!(*master_weight, Some(0));
            assert_eq!(*low_threshold, Some(1));
            assert_eq!(signer.key, SignerKey::PreAuthTx(preauth));
        }
        other => panic!("expected set options, got {other:?}"),
    }
    assert_eq!(sent[1].tx.operations[0].source, Some(pre.temp));

    let side_tx = build_export_tx(
        h.side.as_ref(),
        &h.custodian.contracts,
        &ExportRequest {
            exporter_key: &exporter_key,
            asset: Asset::Native,
            input_amount: 80 * ONE,
            input_anchor: [0x55; 32],
            export_amount: 50 * ONE,
            pre_export: pre,
        },
    )
    .await
    .unwrap();

    let payload = payload_of(&side_tx.program);
    let txid = TxId::new([0x66; 32]);
    let mut watcher = ExportWatcher::new(h.custodian.clone());
    watcher
        .handle(&Block {
            height: 1,
            transactions: vec![BlockTx {
                id: txid,
                log: export_log(&h.custodian.contracts.export_stage1_seed, &payload),
            }],
        })
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel(8);
    process_pending(&h.custodian, &tx).await.unwrap();
    let pegout_env = h.main.submitted().pop().unwrap();
    assert_eq!(pegout_env.tx.hash(h.custodian.network()), preauth);
    assert_eq!(state_of(&h, &txid), PegOutState::Ok);
}

#[tokio::test]
async fn test_export_larger_than_input_is_rejected() {
    let h = harness();
    let exporter_key = exporter_key();
    let err = build_export_tx(
        h.side.as_ref(),
        &h.custodian.contracts,
        &ExportRequest {
            exporter_key: &exporter_key,
            asset: Asset::Native,
            input_amount: 10 * ONE,
            input_anchor: [0x55; 32],
            export_amount: 50 * ONE,
            pre_export: PreExport {
                temp: Address::from_public_key([1; 32]),
                seqnum: 1,
            },
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CustodianError::Program(_)));
}
