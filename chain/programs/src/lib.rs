//! Side-ledger programs for the pegging custodian
//!
//! Builds the bytecode the custodian deploys or spends on the side ledger
//! and recognizes the log shapes those programs leave behind. Nothing in
//! this crate performs I/O; identical inputs yield identical bytes.
//!
//! # Modules
//! - `opcodes`: Instruction set, decoder and disassembler
//! - `builder`: Chained bytecode builder with labelled jumps
//! - `hash`: Contract seeds, asset ids, anchors and nonce hashes
//! - `standard`: Retirement, pay-to-multisig and txid verification
//! - `custodian`: Signature checker, export stages, import programs, `ContractSet`
//! - `log`: Log items and export recognition
//! - `errors`: Program errors

pub mod builder;
pub mod custodian;
pub mod errors;
pub mod hash;
pub mod log;
pub mod opcodes;
pub mod standard;

pub use builder::Builder;
pub use custodian::{ContractSet, ExportProgram, Settlement, ValueSpec};
pub use errors::ProgramError;
