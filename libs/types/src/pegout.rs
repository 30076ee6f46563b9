//! Export reference payload and peg-out state
//!
//! `PegOut` is the record the export contract writes into the side-ledger
//! log and the peg-out engine reads back. It is serialized as JSON with
//! byte fields in standard padded base64 and addresses as strkeys; unknown
//! fields are ignored:
//!
//! ```text
//! {"asset":"AAAAAA==","temp":"G…","seqnum":41,"exporter":"G…",
//!  "amount":50,"anchor":"…","pubkey":"…"}
//! ```
//!
//! The payload arrives from an unauthenticated side-ledger log, so it must
//! pass `PegOut::validate` before it is recorded.
//!
//! `PegOutState` is the persisted lifecycle of one export:
//! `not-yet -> retry -> {ok, fail}` or `not-yet -> {ok, fail}`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::Address;
use crate::asset::Asset;
use crate::errors::TypesError;
use crate::ids::TxId;
use crate::xdr::XdrDecode;

/// Serde adapter for `Vec<u8>` as a standard base64 string
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// Reference payload embedded in the export contract's log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PegOut {
    /// Binary asset descriptor
    #[serde(with = "base64_bytes")]
    pub asset: Vec<u8>,
    /// Temporary account address
    pub temp: String,
    /// Sequence number of the temporary account at creation
    pub seqnum: i64,
    /// Exporter's main-ledger address
    pub exporter: String,
    pub amount: i64,
    /// Side-ledger anchor of the exported value
    #[serde(with = "base64_bytes")]
    pub anchor: Vec<u8>,
    /// Exporter's side-ledger public key, used on repayment
    #[serde(with = "base64_bytes")]
    pub pubkey: Vec<u8>,
}

impl PegOut {
    pub fn to_json(&self) -> Result<String, TypesError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn asset(&self) -> Result<Asset, TypesError> {
        Ok(Asset::from_xdr(&self.asset)?)
    }

    pub fn temp_address(&self) -> Result<Address, TypesError> {
        self.temp.parse()
    }

    pub fn exporter_address(&self) -> Result<Address, TypesError> {
        self.exporter.parse()
    }

    /// Exporter public key as a fixed-size array
    pub fn exporter_pubkey(&self) -> Result<[u8; 32], TypesError> {
        self.pubkey
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidLength {
                kind: "exporter public key",
                expected: 32,
                got: self.pubkey.len(),
            })
    }

    /// Check every field the peg-out and settlement will need.
    pub fn validate(&self) -> Result<(), TypesError> {
        self.asset()?;
        self.temp_address()?;
        self.exporter_address()?;
        self.exporter_pubkey()?;
        self.anchor32()?;
        // the peg-out is submitted at seqnum + 1
        if self.seqnum < 0 || self.seqnum == i64::MAX {
            return Err(TypesError::InvalidSequence(self.seqnum));
        }
        if self.amount <= 0 {
            return Err(TypesError::InvalidAmount(self.amount));
        }
        Ok(())
    }

    pub fn anchor32(&self) -> Result<[u8; 32], TypesError> {
        self.anchor
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidLength {
                kind: "anchor",
                expected: 32,
                got: self.anchor.len(),
            })
    }
}

/// Peg-out lifecycle of one export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum PegOutState {
    /// Recorded, not yet submitted
    NotYet = 0,
    /// Submitted and accepted
    Ok = 1,
    /// Rejected with a stale sequence number; eligible for resubmission
    Retry = 2,
    /// Rejected for any other reason
    Fail = 3,
}

impl PegOutState {
    pub const fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Result<Self, TypesError> {
        match value {
            0 => Ok(PegOutState::NotYet),
            1 => Ok(PegOutState::Ok),
            2 => Ok(PegOutState::Retry),
            3 => Ok(PegOutState::Fail),
            other => Err(TypesError::InvalidState(other)),
        }
    }

    /// `ok` and `fail` are final and eligible for settlement
    pub fn is_terminal(self) -> bool {
        matches!(self, PegOutState::Ok | PegOutState::Fail)
    }

    /// States the engine will (re)submit
    pub fn is_pending(self) -> bool {
        matches!(self, PegOutState::NotYet | PegOutState::Retry)
    }

    pub fn can_transition_to(self, next: PegOutState) -> bool {
        use PegOutState::*;
        matches!(
            (self, next),
            (NotYet, Retry) | (NotYet, Ok) | (NotYet, Fail) | (Retry, Ok) | (Retry, Fail)
        )
    }

    /// Validated transition
    pub fn transition(self, next: PegOutState) -> Result<PegOutState, TypesError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TypesError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PegOutState::NotYet => "not-yet",
            PegOutState::Ok => "ok",
            PegOutState::Retry => "retry",
            PegOutState::Fail => "fail",
        }
    }
}

impl fmt::Display for PegOutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted export row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub txid: TxId,
    pub pegout: PegOut,
    pub state: PegOutState,
}
