//! Error types shared by the data model
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

use crate::pegout::PegOutState;

/// Binary codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XdrError {
    #[error("Unexpected end of input: need {needed} bytes, have {available}")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("Unknown discriminant {value} for {kind}")]
    UnknownDiscriminant { kind: &'static str, value: i32 },

    #[error("Length {len} exceeds limit {limit} for {kind}")]
    LengthExceeded {
        kind: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("Non-zero padding")]
    NonZeroPadding,

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("Trailing bytes after value: {0}")]
    TrailingBytes(usize),
}

/// Data model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid length for {kind}: expected {expected}, got {got}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid asset code: {0}")]
    InvalidAssetCode(String),

    #[error("Invalid sequence number: {0}")]
    InvalidSequence(i64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Invalid peg-out state: {0}")]
    InvalidState(i64),

    #[error("Invalid peg-out state transition from {from} to {to}")]
    InvalidTransition { from: PegOutState, to: PegOutState },

    #[error("Binary decoding failed: {0}")]
    Xdr(#[from] XdrError),

    #[error("Payload JSON error: {0}")]
    Json(String),

    #[error("Invalid hex: {0}")]
    Hex(String),
}

impl From<serde_json::Error> for TypesError {
    fn from(e: serde_json::Error) -> Self {
        TypesError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = TypesError::InvalidTransition {
            from: PegOutState::Ok,
            to: PegOutState::Retry,
        };
        assert_eq!(
            err.to_string(),
            "Invalid peg-out state transition from ok to retry"
        );
    }

    #[test]
    fn test_types_error_from_xdr() {
        let err: TypesError = XdrError::NonZeroPadding.into();
        assert!(matches!(err, TypesError::Xdr(_)));
    }
}
