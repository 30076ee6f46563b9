//! Standard contracts shared with ordinary side-ledger wallets

use types::ids::TxId;

use crate::builder::Builder;
use crate::errors::ProgramError;

/// Retirement contract
///
/// Arguments `[refdata value]`. Retires the value and logs refdata.
pub fn retire() -> Result<Vec<u8>, ProgramError> {
    Builder::new().get().retire().get().log().build()
}

/// Deferred signature check run by a spent pay-to-multisig output.
///
/// Contract stack `quorum {pubkeys} anchor`; arguments `[sig prog]`.
/// The signature covers `prog || anchor` and `prog` itself is run, so
/// the signer binds the spend to whatever `prog` checks (usually the txid).
fn multisig_check() -> Result<Vec<u8>, ProgramError> {
    Builder::new()
        .get() //                  quorum {pubkeys} anchor prog
        .dup()
        .roll(2) //                quorum {pubkeys} prog prog anchor
        .cat() //                  quorum {pubkeys} prog msg
        .roll(2)
        .int(0)
        .field() //                quorum prog msg pubkey
        .get()
        .int(0)
        .checksig()
        .verify() //               quorum prog
        .exec()
        .int(1)
        .eq()
        .verify()
        .build()
}

/// Single-quorum pay-to-multisig
///
/// Lock with arguments `[refdata value {pubkeys} quorum]`: logs refdata and
/// outputs the value. When spent, the value is released onto the argument
/// stack followed by a suspended check that must later be called with
/// `[sig prog]`.
pub fn pay_to_multisig() -> Result<Vec<u8>, ProgramError> {
    let unlock = Builder::new()
        .anchor() //     quorum {pubkeys} value anchor
        .swap()
        .put() //        quorum {pubkeys} anchor   [value]
        .push(&multisig_check()?)
        .yield_()
        .build()?;
    Builder::new()
        .get()
        .get()
        .get()
        .get() //        quorum {pubkeys} value refdata
        .log()
        .push(&unlock)
        .output()
        .build()
}

/// Program that succeeds only inside the transaction with `txid`
pub fn verify_txid(txid: &TxId) -> Result<Vec<u8>, ProgramError> {
    Builder::new().txid().push(txid.as_bytes()).eq().verify().build()
}
