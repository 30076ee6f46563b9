//! Custodian contracts
//!
//! All programs here are pure functions of their inputs. `ContractSet`
//! assembles the fixed ones once per custodian key so that recognizing an
//! export never re-derives a seed.
//!
//! Export lifecycle on the side ledger:
//! ```text
//! export tx:     input(exporter value) -> split -> stage 1 -> output(stage 2)
//! settlement:    input(stage 2) + selector -> retire | repay -> custodian sig check
//! ```

use types::ids::NonceHash;

use crate::builder::Builder;
use crate::errors::ProgramError;
use crate::hash::{asset_id, contract_seed, nonce_hash};
use crate::standard;

/// Selector passed to export stage 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Peg-out succeeded: destroy the locked value
    Retire = 1,
    /// Peg-out failed: return the value to the exporter
    Repay = 0,
}

/// A side-ledger value as seen by a spending program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSpec {
    pub amount: i64,
    pub asset_id: [u8; 32],
    pub anchor: [u8; 32],
}

fn push_value(b: &mut Builder, value: &ValueSpec) {
    b.int(value.amount)
        .push(&value.asset_id)
        .push(&value.anchor)
        .tuple(3);
}

/// Verifier requiring the custodian's signature over the transaction id
pub fn sig_checker(custodian_pub: &[u8; 32]) -> Result<Vec<u8>, ProgramError> {
    Builder::new()
        .txid()
        .push(custodian_pub)
        .get()
        .int(0)
        .checksig()
        .verify()
        .build()
}

/// Export stage 2
///
/// Contract stack `{exporter} json value`, argument `selector`. Leaves
/// `[sigchecker zeroval]` on the argument stack for the caller to finalize
/// with and then satisfy.
pub fn export_stage2(
    pay_to_multisig: &[u8],
    retire: &[u8],
    sig_checker: &[u8],
) -> Result<Vec<u8>, ProgramError> {
    Builder::new()
        .splitzero()
        .bury(3)
        .swap() //                         zeroval {exporter} value json
        .get()
        .jumpif("doretire")
        // repay
        .push(b"")
        .put()
        .drop()
        .put()
        .put()
        .int(1)
        .put() //                          ["" value {exporter} 1]
        .call_program(pay_to_multisig)
        .jump("checksig")
        .label("doretire")
        .put()
        .put()
        .drop() //                         [json value]
        .call_program(retire)
        .label("checksig")
        .push(sig_checker)
        .contract()
        .put()
        .put()
        .build()
}

/// Export stage 1
///
/// Arguments `[value json {exporter}]`. Logs an empty marker entry, the
/// entry the export watcher keys on, and outputs itself to resume at stage 2.
pub fn export_stage1(stage2: &[u8]) -> Result<Vec<u8>, ProgramError> {
    Builder::new()
        .push(b"")
        .log()
        .get()
        .get()
        .get()
        .push(stage2)
        .output()
        .build()
}

/// Uniqueness token for one peg-in
///
/// Holds a zero value and releases it, together with the peg's amount, asset
/// and recipient, only to a caller whose seed is `import_issuance_seed`.
pub fn uniqueness_token(
    amount: i64,
    asset_xdr: &[u8],
    recipient_pub: &[u8; 32],
    import_issuance_seed: &[u8; 32],
) -> Result<Vec<u8>, ProgramError> {
    let release = Builder::new()
        .caller()
        .push(import_issuance_seed)
        .eq()
        .verify()
        .put()
        .int(amount)
        .put()
        .push(asset_xdr)
        .put()
        .push(recipient_pub)
        .put()
        .build()?;
    Builder::new().get().push(&release).output().build()
}

/// Import issuance
///
/// Argument: a uniqueness token contract. Issues the token's amount of
/// `asset_id(own seed, asset_xdr)` and locks it to the recipient.
pub fn import_issuance(pay_to_multisig: &[u8]) -> Result<Vec<u8>, ProgramError> {
    Builder::new()
        .get()
        .call()
        .get()
        .get()
        .get()
        .get() //             pubkey asset amount zeroval
        .swap()
        .roll(2)
        .issue() //           pubkey zeroval value
        .merge()
        .push(b"")
        .put()
        .put()
        .tuple(1)
        .put()
        .int(1)
        .put()
        .call_program(pay_to_multisig)
        .build()
}

/// Fixed programs and seeds for one custodian key
#[derive(Debug, Clone)]
pub struct ContractSet {
    pub custodian_pub: [u8; 32],
    pub sig_checker: Vec<u8>,
    pub retire: Vec<u8>,
    pub pay_to_multisig: Vec<u8>,
    pub pay_to_multisig_seed: [u8; 32],
    pub export_stage1: Vec<u8>,
    pub export_stage1_seed: [u8; 32],
    pub export_stage2: Vec<u8>,
    pub import_issuance: Vec<u8>,
    pub import_issuance_seed: [u8; 32],
}

impl ContractSet {
    pub fn new(custodian_pub: [u8; 32]) -> Result<Self, ProgramError> {
        let sig_checker = sig_checker(&custodian_pub)?;
        let retire = standard::retire()?;
        let pay_to_multisig = standard::pay_to_multisig()?;
        let export_stage2 = export_stage2(&pay_to_multisig, &retire, &sig_checker)?;
        let export_stage1 = export_stage1(&export_stage2)?;
        let import_issuance = import_issuance(&pay_to_multisig)?;
        Ok(Self {
            custodian_pub,
            pay_to_multisig_seed: contract_seed(&pay_to_multisig),
            export_stage1_seed: contract_seed(&export_stage1),
            import_issuance_seed: contract_seed(&import_issuance),
            sig_checker,
            retire,
            pay_to_multisig,
            export_stage1,
            export_stage2,
            import_issuance,
        })
    }

    /// Side-ledger id of an imported main-ledger asset
    pub fn imported_asset_id(&self, asset_xdr: &[u8]) -> [u8; 32] {
        asset_id(&self.import_issuance_seed, asset_xdr)
    }

    /// Uniqueness token for a pending peg, with the nonce hash the main-ledger memo must carry
    pub fn peg_token(
        &self,
        nonce: &[u8],
        amount: i64,
        asset_xdr: &[u8],
        recipient_pub: &[u8; 32],
    ) -> Result<(NonceHash, Vec<u8>), ProgramError> {
        let prog = uniqueness_token(amount, asset_xdr, recipient_pub, &self.import_issuance_seed)?;
        Ok((nonce_hash(nonce), prog))
    }

    /// Export transaction up to and including finalize.
    ///
    /// Spends the exporter's single-key output of `input_amount`, splits off
    /// `export_amount` into stage 1 and returns any change to the exporter.
    /// The exporter's deferred signature check is left on the contract stack.
    pub fn export_prefix(&self, req: &ExportProgram<'_>) -> Result<Vec<u8>, ProgramError> {
        if req.input.amount < req.export_amount {
            return Err(ProgramError::InsufficientInput {
                input: req.input.amount,
                export: req.export_amount,
            });
        }
        let mut b = Builder::new();
        b.push(&self.pay_to_multisig_seed)
            .int(1)
            .tuple_of(&[req.exporter_pub])
            .tuple(1);
        push_value(&mut b, &req.input);
        b.tuple(4)
            .input()
            .call() //                   [inputval sigcheck]
            .push(req.payload)
            .log()
            .get()
            .get()
            .int(req.export_amount)
            .split()
            .swap(); //                  sigcheck retireval changeval
        if req.input.amount != req.export_amount {
            b.push(b"")
                .put()
                .put()
                .tuple_of(&[req.exporter_pub])
                .put()
                .int(1)
                .put()
                .call_program(&self.pay_to_multisig);
        } else {
            b.drop();
        }
        b.splitzero()
            .swap()
            .put() //                    sigcheck zeroval  [retireval]
            .push(req.payload)
            .put()
            .tuple_of(&[req.exporter_pub])
            .put()
            .call_program(&self.export_stage1)
            .finalize();
        b.build()
    }

    /// Settlement transaction up to and including finalize.
    ///
    /// Spends the stage 2 output recorded by an export and selects the branch.
    /// The custodian's signature checker is left on the contract stack.
    pub fn settlement_prefix(
        &self,
        exporter_pub: &[u8],
        payload: &[u8],
        value: &ValueSpec,
        selector: Settlement,
    ) -> Result<Vec<u8>, ProgramError> {
        let mut b = Builder::new();
        b.push(&self.export_stage1_seed)
            .tuple_of(&[exporter_pub])
            .push(payload);
        push_value(&mut b, value);
        b.tuple(4)
            .input()
            .int(selector as i64)
            .put()
            .call() //                   [sigchecker zeroval]
            .get()
            .get()
            .swap()
            .finalize();
        b.build()
    }
}

/// Inputs to an export transaction
#[derive(Debug, Clone)]
pub struct ExportProgram<'a> {
    pub exporter_pub: &'a [u8],
    pub payload: &'a [u8],
    pub input: ValueSpec,
    pub export_amount: i64,
}

/// Append the calls that satisfy a deferred signature check.
///
/// `sig_prog` is omitted for the custodian's checker, which only reads a signature.
pub fn with_signature(prefix: &[u8], sig: &[u8], sig_prog: Option<&[u8]>) -> Result<Vec<u8>, ProgramError> {
    let mut b = Builder::new();
    b.push(sig).put();
    if let Some(prog) = sig_prog {
        b.push(prog).put();
    }
    b.call();
    let mut out = prefix.to_vec();
    out.extend_from_slice(&b.build()?);
    Ok(out)
}
