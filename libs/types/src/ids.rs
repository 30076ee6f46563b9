//! Identifier types for pegs, exports and stream positions
//!
//! Both fixed-size identifiers are 32-byte hashes. They are stored as raw
//! bytes in the peg store and rendered as lowercase hex in logs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::TypesError;

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Wrap raw hash bytes
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Parse from a byte slice, which must be exactly 32 bytes long
            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
                let arr: [u8; 32] = bytes.try_into().map_err(|_| TypesError::InvalidLength {
                    kind: $kind,
                    expected: 32,
                    got: bytes.len(),
                })?;
                Ok(Self(arr))
            }

            /// Parse from a 64-character hex string
            pub fn from_hex(s: &str) -> Result<Self, TypesError> {
                let bytes = hex::decode(s).map_err(|e| TypesError::Hex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

hash_id!(
    /// Peg-in correlation key carried in the main-ledger memo.
    ///
    /// Matches the hash recorded when the uniqueness token was created.
    NonceHash,
    "nonce hash"
);

hash_id!(
    /// Side-ledger transaction identifier
    TxId,
    "transaction id"
);

/// Position in the main-ledger transaction stream (an opaque paging token).
///
/// Persisted after each handled transaction so a restarted watcher resumes
/// exactly where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The empty cursor means "from the beginning of history"
    pub fn is_start(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
