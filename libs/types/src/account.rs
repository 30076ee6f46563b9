//! Main-ledger account addresses
//!
//! An account is identified by its Ed25519 public key. The text form is the
//! ledger's strkey: base32 (RFC 4648, no padding) of a version byte, the key
//! and a little-endian CRC16-XModem checksum, which starts with `G`.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{TypesError, XdrError};
use crate::xdr::{XdrDecode, XdrEncode, XdrReader, XdrWriter};

const KEY_TYPE_ED25519: i32 = 0;

/// Strkey version byte of an Ed25519 account id (renders as `G`)
const VERSION_ACCOUNT_ID: u8 = 6 << 3;
const STRKEY_RAW_LEN: usize = 1 + 32 + 2;
const STRKEY_TEXT_LEN: usize = 56;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

// ── Strkey ──────────────────────────────────────────────────────────

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for byte in data {
        buffer = (buffer << 8) | u32::from(*byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Decodes unpadded base32; leftover bits must be zero.
fn base32_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in text.bytes() {
        let value = BASE32_ALPHABET.iter().position(|a| *a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
        buffer &= (1 << bits) - 1;
    }
    (buffer == 0).then_some(out)
}

/// Main-ledger account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 32]);

impl Address {
    pub const fn from_public_key(key: [u8; 32]) -> Self {
        Self(key)
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.0
    }

    /// Signature hint: the last four bytes of the public key
    pub fn hint(&self) -> [u8; 4] {
        [self.0[28], self.0[29], self.0[30], self.0[31]]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = Vec::with_capacity(STRKEY_RAW_LEN);
        raw.push(VERSION_ACCOUNT_ID);
        raw.extend_from_slice(&self.0);
        let crc = crc16_xmodem(&raw);
        raw.extend_from_slice(&crc.to_le_bytes());
        f.write_str(&base32_encode(&raw))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidAddress(s.to_string());
        if s.len() != STRKEY_TEXT_LEN {
            return Err(invalid());
        }
        let raw = base32_decode(s).ok_or_else(invalid)?;
        if raw.len() != STRKEY_RAW_LEN || raw[0] != VERSION_ACCOUNT_ID {
            return Err(invalid());
        }
        let (body, checksum) = raw.split_at(STRKEY_RAW_LEN - 2);
        if crc16_xmodem(body).to_le_bytes() != checksum {
            return Err(invalid());
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&body[1..]);
        Ok(Self(key))
    }
}

impl TryFrom<String> for Address {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

impl XdrEncode for Address {
    fn encode(&self, w: &mut XdrWriter) {
        w.write_i32(KEY_TYPE_ED25519);
        w.write_fixed(&self.0);
    }
}

impl XdrDecode for Address {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        match r.read_i32()? {
            KEY_TYPE_ED25519 => Ok(Self(r.read_fixed::<32>()?)),
            value => Err(XdrError::UnknownDiscriminant {
                kind: "public key type",
                value,
            }),
        }
    }
}
