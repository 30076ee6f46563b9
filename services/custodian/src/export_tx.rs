//! Exporter-side transaction construction
//!
//! Exporting value back to the main ledger takes two steps by the
//! exporter:
//!
//! 1. `submit_pre_export_tx` creates a temporary main-ledger account whose
//!    only signer is the hash of the future peg-out transaction.
//! 2. `build_export_tx` builds the side-ledger transaction that retires the
//!    value into this custodian's export contract, naming that account.
//!
//! The peg-out transaction itself is built by `build_pegout_tx`, both here
//! (to pre-authorize it) and by the peg-out engine (to submit it).

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use tracing::{debug, info};

use programs::custodian::{with_signature, ExportProgram, ValueSpec};
use programs::hash::retire_anchor;
use programs::standard::verify_txid;
use programs::ContractSet;
use types::account::Address;
use types::amount::ONE;
use types::asset::Asset;
use types::errors::TypesError;
use types::pegout::PegOut;
use types::transaction::{
    AccountSigner, Memo, Operation, SetOptions, SignerKey, Transaction,
};
use types::xdr::XdrEncode;

use crate::error::{CustodianError, CustodianResult};
use crate::ledger::{MainLedgerClient, SideLedgerClient, SideTx, SIDE_TX_VERSION};

/// Starting balance of a temporary account
pub const TEMP_ACCOUNT_BALANCE: i64 = 2 * ONE;

/// The peg-out transaction for an export.
///
/// Sourced from the temporary account at `temp_seq + 1`: merge the
/// temporary account into the exporter, then pay the exporter from the
/// custodian account.
pub fn build_pegout_tx(
    custodian: Address,
    exporter: Address,
    temp: Address,
    asset: Asset,
    amount: i64,
    temp_seq: i64,
    base_fee: u32,
) -> Result<Transaction, TypesError> {
    let seq_num = temp_seq
        .checked_add(1)
        .ok_or(TypesError::InvalidSequence(temp_seq))?;
    let operations = vec![
        Operation::account_merge(exporter),
        Operation::payment(Some(custodian), exporter, asset, amount),
    ];
    Ok(Transaction {
        source: temp,
        fee: base_fee.saturating_mul(operations.len() as u32),
        seq_num,
        memo: Memo::None,
        operations,
    })
}

/// `build_pegout_tx` from a recorded payload.
pub fn pegout_tx_for(pegout: &PegOut, custodian: Address, base_fee: u32) -> Result<Transaction, TypesError> {
    build_pegout_tx(
        custodian,
        pegout.exporter_address()?,
        pegout.temp_address()?,
        pegout.asset()?,
        pegout.amount,
        pegout.seqnum,
        base_fee,
    )
}

/// Temporary account ready for an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreExport {
    pub temp: Address,
    pub seqnum: i64,
}

fn seq_i64(seq: u64, account: &Address) -> CustodianResult<i64> {
    i64::try_from(seq).map_err(|_| {
        CustodianError::Invariant(format!("sequence number {seq} of {account} out of range"))
    })
}

/// Create and lock the temporary account for an export of `amount` of `asset`.
pub async fn submit_pre_export_tx(
    main: &dyn MainLedgerClient,
    network: &str,
    base_fee: u32,
    exporter_key: &SigningKey,
    custodian: Address,
    asset: Asset,
    amount: i64,
) -> CustodianResult<PreExport> {
    let exporter = Address::from_verifying_key(&exporter_key.verifying_key());
    let temp_key = SigningKey::generate(&mut OsRng);
    let temp = Address::from_verifying_key(&temp_key.verifying_key());

    let seq = seq_i64(main.sequence_number(&exporter).await?, &exporter)?;
    let create = Transaction {
        source: exporter,
        fee: base_fee,
        seq_num: seq + 1,
        memo: Memo::None,
        operations: vec![Operation::create_account(temp, TEMP_ACCOUNT_BALANCE)],
    };
    main.submit(&create.sign(network, &[exporter_key])).await?;
    debug!(temp = %temp, "Temporary account created");

    let temp_seq = seq_i64(main.sequence_number(&temp).await?, &temp)?;
    let pegout = build_pegout_tx(custodian, exporter, temp, asset, amount, temp_seq, base_fee)?;
    let preauth = pegout.hash(network);

    let lock = Transaction {
        source: exporter,
        fee: base_fee,
        seq_num: seq + 2,
        memo: Memo::None,
        operations: vec![Operation::set_options(
            Some(temp),
            SetOptions {
                master_weight: Some(0),
                low_threshold: Some(1),
                med_threshold: Some(1),
                high_threshold: Some(1),
                signer: Some(AccountSigner {
                    key: SignerKey::PreAuthTx(preauth),
                    weight: 1,
                }),
            },
        )],
    };
    main.submit(&lock.sign(network, &[exporter_key, &temp_key])).await?;
    info!(temp = %temp, seqnum = temp_seq, "Temporary account locked to peg-out");

    Ok(PreExport {
        temp,
        seqnum: temp_seq,
    })
}

/// Inputs to `build_export_tx`
#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
    pub exporter_key: &'a SigningKey,
    pub asset: Asset,
    /// Side-ledger value spent by the export
    pub input_amount: i64,
    pub input_anchor: [u8; 32],
    pub export_amount: i64,
    pub pre_export: PreExport,
}

/// Build and sign the side-ledger export transaction.
pub async fn build_export_tx(
    side: &dyn SideLedgerClient,
    contracts: &ContractSet,
    req: &ExportRequest<'_>,
) -> CustodianResult<SideTx> {
    let exporter_pub = req.exporter_key.verifying_key().to_bytes();
    let asset_xdr = req.asset.to_xdr();
    let pegout = PegOut {
        asset: asset_xdr.clone(),
        temp: req.pre_export.temp.to_string(),
        seqnum: req.pre_export.seqnum,
        exporter: Address::from_public_key(exporter_pub).to_string(),
        amount: req.export_amount,
        anchor: retire_anchor(&req.input_anchor).to_vec(),
        pubkey: exporter_pub.to_vec(),
    };
    let payload = pegout.to_json()?;

    let prefix = contracts.export_prefix(&ExportProgram {
        exporter_pub: &exporter_pub,
        payload: payload.as_bytes(),
        input: ValueSpec {
            amount: req.input_amount,
            asset_id: contracts.imported_asset_id(&asset_xdr),
            anchor: req.input_anchor,
        },
        export_amount: req.export_amount,
    })?;
    let dry = side.dry_run(&prefix).await?;

    let sig_prog = verify_txid(&dry.txid)?;
    let mut message = sig_prog.clone();
    message.extend_from_slice(&req.input_anchor);
    let sig = req.exporter_key.sign(&message);

    let program = with_signature(&prefix, &sig.to_bytes(), Some(&sig_prog))?;
    let full = side.dry_run(&program).await?;
    if full.txid != dry.txid {
        return Err(CustodianError::Invariant(format!(
            "export txid changed from {} to {} after signing",
            dry.txid, full.txid
        )));
    }
    Ok(SideTx {
        version: SIDE_TX_VERSION,
        runlimit: full.runlimit,
        program,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_public_key([b; 32])
    }

    #[test]
    fn test_pegout_tx_uses_next_sequence() {
        let tx = build_pegout_tx(addr(1), addr(2), addr(3), Asset::Native, ONE, 41, 100).unwrap();
        assert_eq!(tx.source, addr(3));
        assert_eq!(tx.seq_num, 42);
        assert_eq!(tx.fee, 200);
    }

    #[test]
    fn test_pegout_tx_rejects_sequence_overflow() {
        let err = build_pegout_tx(addr(1), addr(2), addr(3), Asset::Native, ONE, i64::MAX, 100)
            .unwrap_err();
        assert_eq!(err, TypesError::InvalidSequence(i64::MAX));
    }
}
