//! Program construction and decoding errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("Label defined twice: {0}")]
    DuplicateLabel(String),

    #[error("Jump to undefined label: {0}")]
    UndefinedLabel(String),

    #[error("Jump offset out of range for label {0}")]
    JumpOutOfRange(String),

    #[error("Unknown opcode 0x{0:02x} at offset {1}")]
    UnknownOpcode(u8, usize),

    #[error("Truncated instruction at offset {0}")]
    Truncated(usize),

    #[error("Malformed varint at offset {0}")]
    BadVarint(usize),

    #[error("Input amount {input} is less than export amount {export}")]
    InsufficientInput { input: i64, export: i64 },
}
