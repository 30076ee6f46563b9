//! Types library for the pegging custodian
//!
//! Shared data model for the custodian that moves value between the
//! account-based main ledger and the stack-machine side ledger.
//!
//! # Modules
//! - `ids`: Fixed-size identifiers (NonceHash, TxId) and the stream Cursor
//! - `xdr`: Big-endian binary codec used for every main-ledger structure
//! - `account`: Main-ledger account addresses
//! - `asset`: Native and issued asset descriptors
//! - `amount`: Ledger amount formatting
//! - `transaction`: Memos, operations, transactions, envelopes and signing
//! - `pegout`: Export reference payload and the peg-out state machine
//! - `errors`: Error taxonomy

pub mod ids;
pub mod xdr;
pub mod account;
pub mod asset;
pub mod amount;
pub mod transaction;
pub mod pegout;
pub mod errors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::account::*;
    pub use crate::amount::*;
    pub use crate::asset::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::pegout::*;
    pub use crate::transaction::*;
}
