//! Program builder
//!
//! Assembles bytecode with chained calls, e.g.
//! `Builder::new().op(Opcode::TxId).push(&pubkey).get().int(0).op(Opcode::CheckSig)`.
//! Jumps name a label; offsets are patched in `build`.

use std::collections::HashMap;

use crate::errors::ProgramError;
use crate::opcodes::{write_uvarint, zigzag, Opcode, MAX_SMALL_INT, OP_INT, OP_PUSH};

macro_rules! def_op {
    ($func_name:ident, $op:ident) => {
        /// Adds a `$op` instruction.
        pub fn $func_name(&mut self) -> &mut Self {
            self.op(Opcode::$op)
        }
    };
}

#[derive(Debug, Default, Clone)]
pub struct Builder {
    buf: Vec<u8>,
    labels: HashMap<String, usize>,
    duplicate: Option<String>,
    /// (offset of the i32 immediate, label)
    fixups: Vec<(usize, String)>,
}

impl Builder {
    def_op!(verify, Verify);
    def_op!(exec, Exec);
    def_op!(call, Call);
    def_op!(yield_, Yield);
    def_op!(input, Input);
    def_op!(output, Output);
    def_op!(contract, Contract);
    def_op!(caller, Caller);
    def_op!(log, Log);
    def_op!(txid, TxId);
    def_op!(finalize, Finalize);
    def_op!(get, Get);
    def_op!(put, Put);
    def_op!(drop, Drop);
    def_op!(dup, Dup);
    def_op!(eq, Equal);
    def_op!(cat, Cat);
    def_op!(checksig, CheckSig);
    def_op!(field, Field);
    def_op!(split, Split);
    def_op!(merge, Merge);
    def_op!(issue, Issue);
    def_op!(retire, Retire);
    def_op!(anchor, Anchor);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.buf.push(op as u8);
        self
    }

    pub fn int(&mut self, v: i64) -> &mut Self {
        if (0..=i64::from(MAX_SMALL_INT)).contains(&v) {
            self.buf.push(v as u8);
        } else {
            self.buf.push(OP_INT);
            write_uvarint(&mut self.buf, zigzag(v));
        }
        self
    }

    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.push(OP_PUSH);
        write_uvarint(&mut self.buf, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// `n roll`
    pub fn roll(&mut self, n: i64) -> &mut Self {
        self.int(n).op(Opcode::Roll)
    }

    /// `n bury`
    pub fn bury(&mut self, n: i64) -> &mut Self {
        self.int(n).op(Opcode::Bury)
    }

    /// `1 roll`
    pub fn swap(&mut self) -> &mut Self {
        self.roll(1)
    }

    /// `0 split`: splits a zero-amount value off the top value
    pub fn splitzero(&mut self) -> &mut Self {
        self.int(0).split()
    }

    /// `n tuple`
    pub fn tuple(&mut self, n: i64) -> &mut Self {
        self.int(n).op(Opcode::Tuple)
    }

    /// Push a tuple of byte strings.
    pub fn tuple_of(&mut self, items: &[&[u8]]) -> &mut Self {
        for item in items {
            self.push(item);
        }
        self.tuple(items.len() as i64)
    }

    /// `prog contract call`
    pub fn call_program(&mut self, prog: &[u8]) -> &mut Self {
        self.push(prog).contract().call()
    }

    pub fn label(&mut self, name: &str) -> &mut Self {
        if self.labels.insert(name.to_string(), self.buf.len()).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name.to_string());
        }
        self
    }

    /// `jumpif:label`
    pub fn jumpif(&mut self, label: &str) -> &mut Self {
        self.buf.push(Opcode::JumpIf as u8);
        self.fixups.push((self.buf.len(), label.to_string()));
        self.buf.extend_from_slice(&[0; 4]);
        self
    }

    /// `1 jumpif:label`
    pub fn jump(&mut self, label: &str) -> &mut Self {
        self.int(1).jumpif(label)
    }

    /// Resolve jumps and return the bytecode.
    pub fn build(&self) -> Result<Vec<u8>, ProgramError> {
        if let Some(name) = &self.duplicate {
            return Err(ProgramError::DuplicateLabel(name.clone()));
        }
        let mut out = self.buf.clone();
        for (at, label) in &self.fixups {
            let target = *self
                .labels
                .get(label)
                .ok_or_else(|| ProgramError::UndefinedLabel(label.clone()))?;
            let from = at + 4;
            let offset = i32::try_from(target as i64 - from as i64)
                .map_err(|_| ProgramError::JumpOutOfRange(label.clone()))?;
            out[*at..from].copy_from_slice(&offset.to_le_bytes());
        }
        Ok(out)
    }
}
