//! Ledger collaborators
//!
//! The custodian talks to both ledgers only through these traits. Client
//! implementations live outside this crate; `crate::mock` provides
//! in-memory ones.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use programs::log::Item;
use types::account::Address;
use types::ids::{Cursor, TxId};
use types::transaction::{SignedTransaction, TransactionResultCode};

// ── Errors ──────────────────────────────────────────────────────────

/// Stream and query failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Malformed ledger response: {0}")]
    Malformed(String),
}

/// Main-ledger submission failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The ledger evaluated and rejected the transaction
    #[error("Transaction rejected: {code}")]
    Rejected { code: TransactionResultCode },

    /// The submission may or may not have reached the ledger
    #[error("Transport error: {0}")]
    Transport(String),
}

impl SubmitError {
    pub fn result_code(&self) -> Option<&TransactionResultCode> {
        match self {
            SubmitError::Rejected { code } => Some(code),
            SubmitError::Transport(_) => None,
        }
    }
}

/// Side-ledger submission failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// A value the transaction consumes no longer exists
    #[error("Contract value already spent")]
    AlreadySpent,

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ── Main ledger ─────────────────────────────────────────────────────

/// One transaction from an account's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedTx {
    /// Position to resume after this transaction
    pub paging_token: Cursor,
    /// Encoded `SignedTransaction`
    pub envelope_xdr: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResult {
    pub hash: [u8; 32],
    pub ledger: u64,
}

#[async_trait]
pub trait MainLedgerClient: Send + Sync {
    async fn submit(&self, tx: &SignedTransaction) -> Result<SubmitResult, SubmitError>;

    /// Transactions touching `account`, in ledger order, strictly after `cursor`.
    ///
    /// The stream ends or yields an error when the connection drops; the
    /// caller reconnects from its last persisted cursor.
    fn stream_transactions(
        &self,
        account: &Address,
        cursor: Cursor,
    ) -> BoxStream<'static, Result<StreamedTx, LedgerError>>;

    async fn sequence_number(&self, account: &Address) -> Result<u64, LedgerError>;
}

// ── Side ledger ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTx {
    pub id: TxId,
    pub log: Vec<Vec<Item>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub transactions: Vec<BlockTx>,
}

/// Result of validating a program without submitting it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DryRun {
    /// Fixed once the program finalizes
    pub txid: TxId,
    pub runlimit: i64,
}

/// Side-ledger transaction ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideTx {
    pub version: i64,
    pub runlimit: i64,
    pub program: Vec<u8>,
}

pub const SIDE_TX_VERSION: i64 = 3;

#[async_trait]
pub trait SideLedgerClient: Send + Sync {
    /// Committed blocks in height order, starting at `height`.
    fn blocks_from(&self, height: u64) -> BoxStream<'static, Result<Block, LedgerError>>;

    /// Validate `program` up to the point its transaction id is known.
    ///
    /// A program ending in an unsatisfied deferred check still reports the
    /// id, since the id is fixed at finalize.
    async fn dry_run(&self, program: &[u8]) -> Result<DryRun, LedgerError>;

    async fn submit(&self, tx: &SideTx) -> Result<TxId, SettlementError>;
}
