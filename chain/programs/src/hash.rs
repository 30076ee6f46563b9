//! Content-derived hashes
//!
//! Every hash is domain separated by a function name:
//! `SHA-256("VMHash" || u32be(len(name)) || name || data)`.

use sha2::{Digest, Sha256};
use types::ids::NonceHash;

pub fn vm_hash(function: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"VMHash");
    hasher.update((function.len() as u32).to_be_bytes());
    hasher.update(function.as_bytes());
    hasher.update(data);
    hasher.finalize().into()
}

/// Seed identifying a contract by its program bytes
pub fn contract_seed(program: &[u8]) -> [u8; 32] {
    vm_hash("ContractSeed", program)
}

/// Identifier of the asset issued by the contract with `issuer_seed` under `tag`
pub fn asset_id(issuer_seed: &[u8; 32], tag: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(32 + tag.len());
    data.extend_from_slice(issuer_seed);
    data.extend_from_slice(tag);
    vm_hash("AssetID", &data)
}

/// Peg-in correlation key for a nonce
pub fn nonce_hash(nonce: &[u8]) -> NonceHash {
    NonceHash::new(vm_hash("Nonce", nonce))
}

/// Anchor of the value left after splitting off an amount and then a zero value
pub fn retire_anchor(anchor: &[u8]) -> [u8; 32] {
    let split2 = vm_hash("Split2", anchor);
    vm_hash("Split1", &split2)
}
