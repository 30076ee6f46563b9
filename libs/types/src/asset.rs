//! Main-ledger asset descriptors
//!
//! An asset is either the ledger's native asset or an asset issued by an
//! account under a short alphanumeric code. The binary form (`asset_xdr`) is
//! what the peg store records and what the side ledger embeds in import and
//! export contracts, so it must be byte-stable.

use std::fmt;

use crate::account::Address;
use crate::errors::{TypesError, XdrError};
use crate::xdr::{XdrDecode, XdrEncode, XdrReader, XdrWriter};

const ASSET_TYPE_NATIVE: i32 = 0;
const ASSET_TYPE_ALPHANUM4: i32 = 1;
const ASSET_TYPE_ALPHANUM12: i32 = 2;

/// Asset descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Native,
    /// Issued asset with a 1-4 character code (zero padded)
    CreditAlphanum4 { code: [u8; 4], issuer: Address },
    /// Issued asset with a 5-12 character code (zero padded)
    CreditAlphanum12 { code: [u8; 12], issuer: Address },
}

impl Asset {
    /// Build an issued asset, choosing the descriptor width from the code length.
    pub fn credit(code: &str, issuer: Address) -> Result<Self, TypesError> {
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TypesError::InvalidAssetCode(code.to_string()));
        }
        match code.len() {
            1..=4 => {
                let mut buf = [0u8; 4];
                buf[..code.len()].copy_from_slice(code.as_bytes());
                Ok(Asset::CreditAlphanum4 { code: buf, issuer })
            }
            5..=12 => {
                let mut buf = [0u8; 12];
                buf[..code.len()].copy_from_slice(code.as_bytes());
                Ok(Asset::CreditAlphanum12 { code: buf, issuer })
            }
            _ => Err(TypesError::InvalidAssetCode(code.to_string())),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    /// Asset code with padding stripped; `None` for the native asset
    pub fn code(&self) -> Option<String> {
        let raw: &[u8] = match self {
            Asset::Native => return None,
            Asset::CreditAlphanum4 { code, .. } => code,
            Asset::CreditAlphanum12 { code, .. } => code,
        };
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Some(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    pub fn issuer(&self) -> Option<&Address> {
        match self {
            Asset::Native => None,
            Asset::CreditAlphanum4 { issuer, .. } | Asset::CreditAlphanum12 { issuer, .. } => {
                Some(issuer)
            }
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code(), self.issuer()) {
            (Some(code), Some(issuer)) => write!(f, "{}:{}", code, issuer),
            _ => f.write_str("native"),
        }
    }
}

impl XdrEncode for Asset {
    fn encode(&self, w: &mut XdrWriter) {
        match self {
            Asset::Native => w.write_i32(ASSET_TYPE_NATIVE),
            Asset::CreditAlphanum4 { code, issuer } => {
                w.write_i32(ASSET_TYPE_ALPHANUM4);
                w.write_fixed(code);
                issuer.encode(w);
            }
            Asset::CreditAlphanum12 { code, issuer } => {
                w.write_i32(ASSET_TYPE_ALPHANUM12);
                w.write_fixed(code);
                issuer.encode(w);
            }
        }
    }
}

impl XdrDecode for Asset {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        match r.read_i32()? {
            ASSET_TYPE_NATIVE => Ok(Asset::Native),
            ASSET_TYPE_ALPHANUM4 => Ok(Asset::CreditAlphanum4 {
                code: r.read_fixed::<4>()?,
                issuer: Address::decode(r)?,
            }),
            ASSET_TYPE_ALPHANUM12 => Ok(Asset::CreditAlphanum12 {
                code: r.read_fixed::<12>()?,
                issuer: Address::decode(r)?,
            }),
            value => Err(XdrError::UnknownDiscriminant {
                kind: "asset type",
                value,
            }),
        }
    }
}
