//! Side-ledger instruction set
//!
//! Encoding:
//! ```text
//! 0x00..=0x1f          push the small integer equal to the opcode
//! 0x20..=0x5d          named operation
//! 0x21 JUMPIF <i32le>  conditional relative jump, offset from the end of the instruction
//! 0x5e INT <varint>    push a zigzag-varint integer
//! 0x5f PUSH <uvarint> <bytes>
//! ```
//! Stack effects are described on each opcode as `before -> after` on the
//! contract stack unless noted. `get`/`put` move items between the contract
//! stack and the argument stack.

use crate::errors::ProgramError;

macro_rules! opcodes {
    ($( $(#[$doc:meta])* $name:ident = $code:literal, $mnemonic:literal; )*) => {
        /// Named operations
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$doc])* $name = $code, )*
        }

        impl Opcode {
            pub fn from_byte(b: u8) -> Option<Self> {
                match b {
                    $( $code => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }
        }
    };
}

opcodes! {
    /// `x -> `; aborts unless x is non-zero
    Verify = 0x20, "verify";
    /// `cond -> `; followed by a 4-byte offset
    JumpIf = 0x21, "jumpif";
    /// `prog -> ...`; runs prog inline in the current contract
    Exec = 0x22, "exec";
    /// `contract -> `; invokes a contract
    Call = 0x23, "call";
    /// `prog -> `; suspends the current contract onto the argument stack, resuming at prog
    Yield = 0x24, "yield";
    /// `snapshot -> contract`; spends a prior output
    Input = 0x26, "input";
    /// `prog -> `; snapshots the current contract as a ledger output that resumes at prog
    Output = 0x27, "output";
    /// `prog -> contract`
    Contract = 0x28, "contract";
    /// ` -> seed` of the calling contract
    Caller = 0x2b, "caller";
    /// `data -> `; appends a log entry tagged with the current contract's seed
    Log = 0x2e, "log";
    /// ` -> txid`; only valid after finalize
    TxId = 0x30, "txid";
    /// `zeroval -> `; seals the transaction log
    Finalize = 0x31, "finalize";
    /// `x(n) .. x(0) n -> x(n-1) .. x(0) x(n)`
    Roll = 0x32, "roll";
    /// `x(n-1) .. x(0) y n -> y x(n-1) .. x(0)`
    Bury = 0x33, "bury";
    /// `[arg] x -> x`
    Get = 0x35, "get";
    /// `x -> [arg] x`
    Put = 0x36, "put";
    Drop = 0x38, "drop";
    Dup = 0x39, "dup";
    /// `a b -> a==b`
    Equal = 0x3a, "eq";
    Not = 0x3b, "not";
    /// `a b -> a||b`
    Cat = 0x3c, "cat";
    /// `msg pubkey sig scheme -> ok`
    CheckSig = 0x3f, "checksig";
    /// `x(n-1) .. x(0) n -> {x(n-1) .. x(0)}`
    Tuple = 0x40, "tuple";
    /// `tuple i -> tuple[i]`
    Field = 0x43, "field";
    /// `value amount -> value' split`
    Split = 0x49, "split";
    /// `a b -> a+b` over values of one asset
    Merge = 0x48, "merge";
    /// `amount tag -> value` issued by the current contract
    Issue = 0x4a, "issue";
    /// `value -> `; destroys the value and logs it
    Retire = 0x4b, "retire";
    /// `value -> value anchor`
    Anchor = 0x4e, "anchor";
}

pub const OP_INT: u8 = 0x5e;
pub const OP_PUSH: u8 = 0x5f;
pub const MAX_SMALL_INT: u8 = 0x1f;

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Int(i64),
    Push(Vec<u8>),
    JumpIf(i32),
    Op(Opcode),
}

pub(crate) fn write_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

fn read_uvarint(data: &[u8], pos: &mut usize) -> Result<u64, ProgramError> {
    let start = *pos;
    let mut out = 0u64;
    for shift in (0..64).step_by(7) {
        let b = *data.get(*pos).ok_or(ProgramError::Truncated(start))?;
        *pos += 1;
        out |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(out);
        }
    }
    Err(ProgramError::BadVarint(start))
}

pub(crate) fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Decode a program into instructions.
pub fn decode(program: &[u8]) -> Result<Vec<Instruction>, ProgramError> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < program.len() {
        let at = pos;
        let b = program[pos];
        pos += 1;
        let ins = match b {
            0..=MAX_SMALL_INT => Instruction::Int(i64::from(b)),
            OP_INT => Instruction::Int(unzigzag(read_uvarint(program, &mut pos)?)),
            OP_PUSH => {
                let len = read_uvarint(program, &mut pos)? as usize;
                let end = pos.checked_add(len).ok_or(ProgramError::Truncated(at))?;
                let bytes = program.get(pos..end).ok_or(ProgramError::Truncated(at))?;
                pos = end;
                Instruction::Push(bytes.to_vec())
            }
            b if b == Opcode::JumpIf as u8 => {
                let raw = program.get(pos..pos + 4).ok_or(ProgramError::Truncated(at))?;
                pos += 4;
                Instruction::JumpIf(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            b => Instruction::Op(Opcode::from_byte(b).ok_or(ProgramError::UnknownOpcode(b, at))?),
        };
        out.push(ins);
    }
    Ok(out)
}

/// Render a program as assembler text, one instruction per token.
pub fn disassemble(program: &[u8]) -> Result<String, ProgramError> {
    let parts: Vec<String> = decode(program)?
        .into_iter()
        .map(|ins| match ins {
            Instruction::Int(v) => v.to_string(),
            Instruction::Push(bytes) => format!("x'{}'", hex::encode(bytes)),
            Instruction::JumpIf(off) => format!("jumpif:{:+}", off),
            Instruction::Op(op) => op.mnemonic().to_string(),
        })
        .collect();
    Ok(parts.join(" "))
}
