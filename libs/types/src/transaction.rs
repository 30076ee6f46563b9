//! Main-ledger transactions
//!
//! Memos, operations, transactions and signed envelopes, with their
//! canonical binary encoding, network-bound hashing and Ed25519 signing.
//!
//! The transaction hash is
//! `SHA-256(SHA-256(network_passphrase) ++ ENVELOPE_TYPE_TX ++ tx_xdr)`.
//! Pre-authorized transactions are identified by this hash, so two
//! transactions built from identical inputs must encode identically.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::account::Address;
use crate::asset::Asset;
use crate::errors::XdrError;
use crate::ids::NonceHash;
use crate::xdr::{XdrDecode, XdrEncode, XdrReader, XdrWriter};

const ENVELOPE_TYPE_TX: i32 = 2;

const MAX_MEMO_TEXT: usize = 28;
const MAX_OPERATIONS: usize = 100;
const MAX_SIGNATURES: usize = 20;
const MAX_PAYMENT_PATH: usize = 5;
const MAX_DATA_NAME: usize = 64;
const MAX_DATA_VALUE: usize = 64;

// ── Memo ────────────────────────────────────────────────────────────

/// Transaction memo
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Memo {
    #[default]
    None,
    Text(String),
    Id(u64),
    /// 32-byte hash; peg-ins carry their nonce hash here
    Hash([u8; 32]),
    Return([u8; 32]),
}

impl Memo {
    /// The peg-in correlation key, if this memo is a fixed-length hash
    pub fn nonce_hash(&self) -> Option<NonceHash> {
        match self {
            Memo::Hash(h) => Some(NonceHash::new(*h)),
            _ => None,
        }
    }
}

impl XdrEncode for Memo {
    fn encode(&self, w: &mut XdrWriter) {
        match self {
            Memo::None => w.write_i32(0),
            Memo::Text(text) => {
                w.write_i32(1);
                w.write_string(text);
            }
            Memo::Id(id) => {
                w.write_i32(2);
                w.write_u64(*id);
            }
            Memo::Hash(h) => {
                w.write_i32(3);
                w.write_fixed(h);
            }
            Memo::Return(h) => {
                w.write_i32(4);
                w.write_fixed(h);
            }
        }
    }
}

impl XdrDecode for Memo {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        match r.read_i32()? {
            0 => Ok(Memo::None),
            1 => Ok(Memo::Text(r.read_string("memo text", MAX_MEMO_TEXT)?)),
            2 => Ok(Memo::Id(r.read_u64()?)),
            3 => Ok(Memo::Hash(r.read_fixed::<32>()?)),
            4 => Ok(Memo::Return(r.read_fixed::<32>()?)),
            value => Err(XdrError::UnknownDiscriminant {
                kind: "memo type",
                value,
            }),
        }
    }
}

// ── Signers ─────────────────────────────────────────────────────────

/// Key that may be added as an account signer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKey {
    Ed25519([u8; 32]),
    /// Hash of a pre-authorized transaction; consumed when that transaction applies
    PreAuthTx([u8; 32]),
    HashX([u8; 32]),
}

impl XdrEncode for SignerKey {
    fn encode(&self, w: &mut XdrWriter) {
        let (kind, key) = match self {
            SignerKey::Ed25519(k) => (0, k),
            SignerKey::PreAuthTx(k) => (1, k),
            SignerKey::HashX(k) => (2, k),
        };
        w.write_i32(kind);
        w.write_fixed(key);
    }
}

impl XdrDecode for SignerKey {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        let kind = r.read_i32()?;
        let key = r.read_fixed::<32>()?;
        match kind {
            0 => Ok(SignerKey::Ed25519(key)),
            1 => Ok(SignerKey::PreAuthTx(key)),
            2 => Ok(SignerKey::HashX(key)),
            value => Err(XdrError::UnknownDiscriminant {
                kind: "signer key type",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSigner {
    pub key: SignerKey,
    pub weight: u32,
}

impl XdrEncode for AccountSigner {
    fn encode(&self, w: &mut XdrWriter) {
        self.key.encode(w);
        w.write_u32(self.weight);
    }
}

impl XdrDecode for AccountSigner {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        Ok(Self {
            key: SignerKey::decode(r)?,
            weight: r.read_u32()?,
        })
    }
}

// ── Operations ──────────────────────────────────────────────────────

/// Account option changes; `None` leaves a setting untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub master_weight: Option<u32>,
    pub low_threshold: Option<u32>,
    pub med_threshold: Option<u32>,
    pub high_threshold: Option<u32>,
    pub signer: Option<AccountSigner>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationBody {
    CreateAccount {
        destination: Address,
        starting_balance: i64,
    },
    Payment {
        destination: Address,
        asset: Asset,
        amount: i64,
    },
    SetOptions(SetOptions),
    /// Transfer the remaining balance to `destination` and delete the source account
    AccountMerge { destination: Address },
    /// Any other operation type, kept as its raw encoded body
    Other { kind: OperationKind, body: Vec<u8> },
}

/// Operation types the custodian never builds or interprets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    PathPaymentStrictReceive = 2,
    ManageSellOffer = 3,
    CreatePassiveSellOffer = 4,
    ChangeTrust = 6,
    AllowTrust = 7,
    Inflation = 9,
    ManageData = 10,
    BumpSequence = 11,
    ManageBuyOffer = 12,
    PathPaymentStrictSend = 13,
}

impl OperationKind {
    fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            2 => Self::PathPaymentStrictReceive,
            3 => Self::ManageSellOffer,
            4 => Self::CreatePassiveSellOffer,
            6 => Self::ChangeTrust,
            7 => Self::AllowTrust,
            9 => Self::Inflation,
            10 => Self::ManageData,
            11 => Self::BumpSequence,
            12 => Self::ManageBuyOffer,
            13 => Self::PathPaymentStrictSend,
            _ => return None,
        })
    }

    /// Read past one body of this kind.
    fn skip_body(self, r: &mut XdrReader<'_>) -> Result<(), XdrError> {
        match self {
            Self::PathPaymentStrictReceive | Self::PathPaymentStrictSend => {
                Asset::decode(r)?;
                r.read_i64()?;
                Address::decode(r)?;
                Asset::decode(r)?;
                r.read_i64()?;
                let len = r.read_u32()? as usize;
                if len > MAX_PAYMENT_PATH {
                    return Err(XdrError::LengthExceeded {
                        kind: "payment path",
                        len,
                        limit: MAX_PAYMENT_PATH,
                    });
                }
                for _ in 0..len {
                    Asset::decode(r)?;
                }
            }
            Self::ManageSellOffer | Self::ManageBuyOffer => {
                Asset::decode(r)?;
                Asset::decode(r)?;
                r.read_i64()?;
                // price n/d
                r.read_i32()?;
                r.read_i32()?;
                // offer id
                r.read_i64()?;
            }
            Self::CreatePassiveSellOffer => {
                Asset::decode(r)?;
                Asset::decode(r)?;
                r.read_i64()?;
                r.read_i32()?;
                r.read_i32()?;
            }
            Self::ChangeTrust => {
                Asset::decode(r)?;
                r.read_i64()?;
            }
            Self::AllowTrust => {
                Address::decode(r)?;
                match r.read_i32()? {
                    1 => {
                        r.read_fixed::<4>()?;
                    }
                    2 => {
                        r.read_fixed::<12>()?;
                    }
                    value => {
                        return Err(XdrError::UnknownDiscriminant {
                            kind: "asset code type",
                            value,
                        })
                    }
                }
                r.read_u32()?;
            }
            Self::Inflation => {}
            Self::ManageData => {
                r.read_string("data name", MAX_DATA_NAME)?;
                if r.read_bool()? {
                    r.read_var("data value", MAX_DATA_VALUE)?;
                }
            }
            Self::BumpSequence => {
                r.read_i64()?;
            }
        }
        Ok(())
    }
}

/// A single operation; `source` overrides the transaction source account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub source: Option<Address>,
    pub body: OperationBody,
}

impl Operation {
    pub fn payment(source: Option<Address>, destination: Address, asset: Asset, amount: i64) -> Self {
        Self {
            source,
            body: OperationBody::Payment {
                destination,
                asset,
                amount,
            },
        }
    }

    pub fn account_merge(destination: Address) -> Self {
        Self {
            source: None,
            body: OperationBody::AccountMerge { destination },
        }
    }

    pub fn create_account(destination: Address, starting_balance: i64) -> Self {
        Self {
            source: None,
            body: OperationBody::CreateAccount {
                destination,
                starting_balance,
            },
        }
    }

    pub fn set_options(source: Option<Address>, options: SetOptions) -> Self {
        Self {
            source,
            body: OperationBody::SetOptions(options),
        }
    }

    /// Returns `(asset, amount)` if this is a payment to `account`.
    pub fn payment_to(&self, account: &Address) -> Option<(Asset, i64)> {
        match &self.body {
            OperationBody::Payment {
                destination,
                asset,
                amount,
            } if destination == account => Some((*asset, *amount)),
            _ => None,
        }
    }
}

impl XdrEncode for Operation {
    fn encode(&self, w: &mut XdrWriter) {
        w.write_option(self.source.as_ref());
        match &self.body {
            OperationBody::CreateAccount {
                destination,
                starting_balance,
            } => {
                w.write_i32(0);
                destination.encode(w);
                w.write_i64(*starting_balance);
            }
            OperationBody::Payment {
                destination,
                asset,
                amount,
            } => {
                w.write_i32(1);
                destination.encode(w);
                asset.encode(w);
                w.write_i64(*amount);
            }
            OperationBody::SetOptions(opts) => {
                w.write_i32(5);
                w.write_option(opts.master_weight.as_ref());
                w.write_option(opts.low_threshold.as_ref());
                w.write_option(opts.med_threshold.as_ref());
                w.write_option(opts.high_threshold.as_ref());
                w.write_option(opts.signer.as_ref());
            }
            OperationBody::AccountMerge { destination } => {
                w.write_i32(8);
                destination.encode(w);
            }
            OperationBody::Other { kind, body } => {
                w.write_i32(*kind as i32);
                w.write_fixed(body);
            }
        }
    }
}

impl XdrDecode for Operation {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        let source = r.read_option::<Address>()?;
        let body = match r.read_i32()? {
            0 => OperationBody::CreateAccount {
                destination: Address::decode(r)?,
                starting_balance: r.read_i64()?,
            },
            1 => OperationBody::Payment {
                destination: Address::decode(r)?,
                asset: Asset::decode(r)?,
                amount: r.read_i64()?,
            },
            5 => OperationBody::SetOptions(SetOptions {
                master_weight: r.read_option()?,
                low_threshold: r.read_option()?,
                med_threshold: r.read_option()?,
                high_threshold: r.read_option()?,
                signer: r.read_option()?,
            }),
            8 => OperationBody::AccountMerge {
                destination: Address::decode(r)?,
            },
            value => {
                let kind = OperationKind::from_i32(value).ok_or(XdrError::UnknownDiscriminant {
                    kind: "operation type",
                    value,
                })?;
                let start = r.position();
                kind.skip_body(r)?;
                OperationBody::Other {
                    kind,
                    body: r.consumed_since(start).to_vec(),
                }
            }
        };
        Ok(Self { source, body })
    }
}

// ── Transactions ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub source: Address,
    pub fee: u32,
    /// Must be exactly one more than the source account's current sequence number
    pub seq_num: i64,
    pub memo: Memo,
    pub operations: Vec<Operation>,
}

/// Network identifier: hash of the network passphrase
pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

impl Transaction {
    /// Network-bound transaction hash; this is what signers sign.
    pub fn hash(&self, network_passphrase: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(network_id(network_passphrase));
        hasher.update(ENVELOPE_TYPE_TX.to_be_bytes());
        hasher.update(self.to_xdr());
        hasher.finalize().into()
    }

    /// Sign with every key in `keys`, producing an envelope.
    pub fn sign(self, network_passphrase: &str, keys: &[&SigningKey]) -> SignedTransaction {
        let hash = self.hash(network_passphrase);
        let signatures = keys
            .iter()
            .map(|key| {
                let public = Address::from_verifying_key(&key.verifying_key());
                DecoratedSignature {
                    hint: public.hint(),
                    signature: key.sign(&hash).to_bytes(),
                }
            })
            .collect();
        SignedTransaction {
            tx: self,
            signatures,
        }
    }
}

impl XdrEncode for Transaction {
    fn encode(&self, w: &mut XdrWriter) {
        self.source.encode(w);
        w.write_u32(self.fee);
        w.write_i64(self.seq_num);
        // time bounds: none
        w.write_bool(false);
        self.memo.encode(w);
        w.write_u32(self.operations.len() as u32);
        for op in &self.operations {
            op.encode(w);
        }
        // ext
        w.write_i32(0);
    }
}

impl XdrDecode for Transaction {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        let source = Address::decode(r)?;
        let fee = r.read_u32()?;
        let seq_num = r.read_i64()?;
        if r.read_bool()? {
            // min and max time; not produced by the custodian, accepted and dropped
            r.read_u64()?;
            r.read_u64()?;
        }
        let memo = Memo::decode(r)?;
        let count = r.read_u32()? as usize;
        if count > MAX_OPERATIONS {
            return Err(XdrError::LengthExceeded {
                kind: "operations",
                len: count,
                limit: MAX_OPERATIONS,
            });
        }
        let operations = (0..count)
            .map(|_| Operation::decode(r))
            .collect::<Result<Vec<_>, _>>()?;
        match r.read_i32()? {
            0 => {}
            value => {
                return Err(XdrError::UnknownDiscriminant {
                    kind: "transaction ext",
                    value,
                })
            }
        }
        Ok(Self {
            source,
            fee,
            seq_num,
            memo,
            operations,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: [u8; 64],
}

impl XdrEncode for DecoratedSignature {
    fn encode(&self, w: &mut XdrWriter) {
        w.write_fixed(&self.hint);
        w.write_var(&self.signature);
    }
}

impl XdrDecode for DecoratedSignature {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        let hint = r.read_fixed::<4>()?;
        let raw = r.read_var("signature", 64)?;
        let signature: [u8; 64] = raw.try_into().map_err(|v: Vec<u8>| XdrError::UnexpectedEof {
            needed: 64,
            available: v.len(),
        })?;
        Ok(Self { hint, signature })
    }
}

/// Transaction envelope: the transaction plus its signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

impl SignedTransaction {
    /// Whether `key` produced one of the envelope's signatures.
    pub fn is_signed_by(&self, network_passphrase: &str, key: &VerifyingKey) -> bool {
        let hash = self.tx.hash(network_passphrase);
        let hint = Address::from_verifying_key(key).hint();
        self.signatures.iter().any(|sig| {
            sig.hint == hint
                && key
                    .verify(&hash, &Signature::from_bytes(&sig.signature))
                    .is_ok()
        })
    }
}

impl XdrEncode for SignedTransaction {
    fn encode(&self, w: &mut XdrWriter) {
        self.tx.encode(w);
        w.write_u32(self.signatures.len() as u32);
        for sig in &self.signatures {
            sig.encode(w);
        }
    }
}

impl XdrDecode for SignedTransaction {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        let tx = Transaction::decode(r)?;
        let count = r.read_u32()? as usize;
        if count > MAX_SIGNATURES {
            return Err(XdrError::LengthExceeded {
                kind: "signatures",
                len: count,
                limit: MAX_SIGNATURES,
            });
        }
        let signatures = (0..count)
            .map(|_| DecoratedSignature::decode(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tx, signatures })
    }
}

// ── Result codes ────────────────────────────────────────────────────

/// Transaction-level result code reported for a rejected submission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionResultCode {
    TxFailed,
    TxTooEarly,
    TxTooLate,
    TxMissingOperation,
    /// Sequence number does not match the source account
    TxBadSeq,
    TxBadAuth,
    TxInsufficientBalance,
    TxNoAccount,
    TxInsufficientFee,
    TxBadAuthExtra,
    TxInternalError,
    Other(String),
}

impl TransactionResultCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TxFailed => "tx_failed",
            Self::TxTooEarly => "tx_too_early",
            Self::TxTooLate => "tx_too_late",
            Self::TxMissingOperation => "tx_missing_operation",
            Self::TxBadSeq => "tx_bad_seq",
            Self::TxBadAuth => "tx_bad_auth",
            Self::TxInsufficientBalance => "tx_insufficient_balance",
            Self::TxNoAccount => "tx_no_account",
            Self::TxInsufficientFee => "tx_insufficient_fee",
            Self::TxBadAuthExtra => "tx_bad_auth_extra",
            Self::TxInternalError => "tx_internal_error",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for TransactionResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionResultCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "tx_failed" => Self::TxFailed,
            "tx_too_early" => Self::TxTooEarly,
            "tx_too_late" => Self::TxTooLate,
            "tx_missing_operation" => Self::TxMissingOperation,
            "tx_bad_seq" => Self::TxBadSeq,
            "tx_bad_auth" => Self::TxBadAuth,
            "tx_insufficient_balance" => Self::TxInsufficientBalance,
            "tx_no_account" => Self::TxNoAccount,
            "tx_insufficient_fee" => Self::TxInsufficientFee,
            "tx_bad_auth_extra" => Self::TxBadAuthExtra,
            "tx_internal_error" => Self::TxInternalError,
            other => Self::Other(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    const NETWORK: &str = "Test Network ; 2026";

    fn sample_tx() -> Transaction {
        let source = Address::from_public_key([1u8; 32]);
        let dest = Address::from_public_key([2u8; 32]);
        Transaction {
            source,
            fee: 200,
            seq_num: 41,
            memo: Memo::Hash([5u8; 32]),
            operations: vec![
                Operation::account_merge(dest),
                Operation::payment(Some(Address::from_public_key([3u8; 32])), dest, Asset::Native, 50),
            ],
        }
    }

    #[test]
    fn test_transaction_decode_matches_encode() {
        let tx = sample_tx();
        let decoded = Transaction::from_xdr(&tx.to_xdr()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_hash_is_network_bound() {
        let tx = sample_tx();
        assert_ne!(tx.hash(NETWORK), tx.hash("Other Network"));
        assert_eq!(tx.hash(NETWORK), sample_tx().hash(NETWORK));
    }

    #[test]
    fn test_hash_changes_with_sequence() {
        let mut tx = sample_tx();
        let h1 = tx.hash(NETWORK);
        tx.seq_num += 1;
        assert_ne!(h1, tx.hash(NETWORK));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let signed = sample_tx().sign(NETWORK, &[&key]);
        assert_eq!(signed.signatures.len(), 1);
        assert!(signed.is_signed_by(NETWORK, &key.verifying_key()));
        assert!(!signed.is_signed_by(NETWORK, &other.verifying_key()));
        assert!(!signed.is_signed_by("Other Network", &key.verifying_key()));
    }

    #[test]
    fn test_envelope_decode_matches_encode() {
        let key = SigningKey::generate(&mut OsRng);
        let signed = sample_tx().sign(NETWORK, &[&key]);
        let decoded = SignedTransaction::from_xdr(&signed.to_xdr()).unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn test_memo_nonce_hash_only_for_hash_memos() {
        assert_eq!(
            Memo::Hash([4u8; 32]).nonce_hash(),
            Some(NonceHash::new([4u8; 32]))
        );
        assert_eq!(Memo::Return([4u8; 32]).nonce_hash(), None);
        assert_eq!(Memo::Text("hi".into()).nonce_hash(), None);
    }

    #[test]
    fn test_payment_to() {
        let tx = sample_tx();
        let dest = Address::from_public_key([2u8; 32]);
        assert_eq!(tx.operations[0].payment_to(&dest), None);
        assert_eq!(tx.operations[1].payment_to(&dest), Some((Asset::Native, 50)));
    }

    #[test]
    fn test_set_options_encoding() {
        let op = Operation::set_options(
            Some(Address::from_public_key([8u8; 32])),
            SetOptions {
                master_weight: Some(0),
                low_threshold: Some(1),
                med_threshold: Some(1),
                high_threshold: Some(1),
                signer: Some(AccountSigner {
                    key: SignerKey::PreAuthTx([6u8; 32]),
                    weight: 1,
                }),
            },
        );
        assert_eq!(Operation::from_xdr(&op.to_xdr()).unwrap(), op);
    }

    fn raw_operation(kind: i32, body: &[u8]) -> Vec<u8> {
        let mut w = XdrWriter::new();
        w.write_bool(false);
        w.write_i32(kind);
        w.write_fixed(body);
        w.into_bytes()
    }

    #[test]
    fn test_bump_sequence_decodes_as_other() {
        let bytes = raw_operation(11, &99i64.to_be_bytes());
        let op = Operation::from_xdr(&bytes).unwrap();
        assert_eq!(
            op.body,
            OperationBody::Other {
                kind: OperationKind::BumpSequence,
                body: 99i64.to_be_bytes().to_vec(),
            }
        );
        assert_eq!(op.payment_to(&Address::from_public_key([2u8; 32])), None);
        // re-encodes to the same bytes, so envelope hashes are preserved
        assert_eq!(op.to_xdr(), bytes);
    }

    #[test]
    fn test_other_operations_keep_their_body() {
        let mut change_trust = XdrWriter::new();
        Asset::credit("USD", Address::from_public_key([9u8; 32]))
            .unwrap()
            .encode(&mut change_trust);
        change_trust.write_i64(i64::MAX);

        let mut manage_data = XdrWriter::new();
        manage_data.write_string("peg");
        manage_data.write_bool(true);
        manage_data.write_var(b"value");

        let mut path_payment = XdrWriter::new();
        Asset::Native.encode(&mut path_payment);
        path_payment.write_i64(10);
        Address::from_public_key([2u8; 32]).encode(&mut path_payment);
        Asset::Native.encode(&mut path_payment);
        path_payment.write_i64(10);
        path_payment.write_u32(1);
        Asset::Native.encode(&mut path_payment);

        for (kind, body) in [
            (OperationKind::ChangeTrust, change_trust.into_bytes()),
            (OperationKind::ManageData, manage_data.into_bytes()),
            (OperationKind::PathPaymentStrictSend, path_payment.into_bytes()),
            (OperationKind::Inflation, Vec::new()),
        ] {
            let bytes = raw_operation(kind as i32, &body);
            let op = Operation::from_xdr(&bytes).unwrap();
            assert_eq!(op.body, OperationBody::Other { kind, body });
            assert_eq!(op.to_xdr(), bytes);
        }
    }

    #[test]
    fn test_envelope_with_mixed_operations() {
        let custodian = Address::from_public_key([2u8; 32]);
        let mut tx = sample_tx();
        tx.operations.insert(
            0,
            Operation {
                source: None,
                body: OperationBody::Other {
                    kind: OperationKind::BumpSequence,
                    body: 7i64.to_be_bytes().to_vec(),
                },
            },
        );
        let decoded = Transaction::from_xdr(&tx.to_xdr()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.operations[2].payment_to(&custodian), Some((Asset::Native, 50)));
    }

    #[test]
    fn test_unknown_operation_type_is_an_error() {
        let bytes = raw_operation(42, &[]);
        assert!(matches!(
            Operation::from_xdr(&bytes),
            Err(XdrError::UnknownDiscriminant { value: 42, .. })
        ));
    }

    #[test]
    fn test_result_code_parse() {
        assert_eq!(
            "tx_bad_seq".parse::<TransactionResultCode>().unwrap(),
            TransactionResultCode::TxBadSeq
        );
        assert_eq!(
            "op_weird".parse::<TransactionResultCode>().unwrap(),
            TransactionResultCode::Other("op_weird".into())
        );
    }
}
