use thiserror::Error;

use persistence::StoreError;
use programs::ProgramError;
use types::errors::TypesError;

use crate::ledger::{LedgerError, SettlementError, SubmitError};

/// Central error type for the custodian service
#[derive(Debug, Error)]
pub enum CustodianError {
    /// Persisted state contradicts itself; the process must stop
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Program error: {0}")]
    Program(#[from] ProgramError),

    #[error("Data error: {0}")]
    Types(#[from] TypesError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Submission failed: {0}")]
    Submit(#[from] SubmitError),

    #[error("Settlement failed: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task failed: {0}")]
    Task(String),
}

impl CustodianError {
    /// Whether retrying the same work could succeed.
    ///
    /// Store, ledger and submission failures are transient; everything else
    /// means the data itself is wrong.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CustodianError::Store(_)
                | CustodianError::Ledger(_)
                | CustodianError::Submit(_)
                | CustodianError::Settlement(_)
        )
    }
}

pub type CustodianResult<T> = Result<T, CustodianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CustodianError::Ledger(LedgerError::Transport("reset".into())).is_transient());
        assert!(!CustodianError::Invariant("2 rows".into()).is_transient());
        assert!(!CustodianError::Program(ProgramError::UndefinedLabel("x".into())).is_transient());
    }

    #[test]
    fn test_invariant_message() {
        let err = CustodianError::Invariant("peg update affected 2 rows".into());
        assert_eq!(err.to_string(), "Invariant violated: peg update affected 2 rows");
    }
}
