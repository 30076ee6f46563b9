//! Side-ledger transaction log and export recognition
//!
//! Each log entry is a tuple whose first item is a one-byte code. The
//! shapes this crate cares about:
//! ```text
//! {'I', contract_id, ...}      input
//! {'L', seed, data}            log
//! {'O', contract_id, ...}      output
//! ```
//! Entries are decoded into `LogEntry`; anything else is `Other` and never
//! an error.

/// Item in a log tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Bytes(Vec<u8>),
    Int(i64),
    Tuple(Vec<Item>),
}

impl Item {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Item::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

pub const INPUT_CODE: u8 = b'I';
pub const LOG_CODE: u8 = b'L';
pub const OUTPUT_CODE: u8 = b'O';
pub const RETIRE_CODE: u8 = b'X';
pub const FINALIZE_CODE: u8 = b'F';

/// Recognized log entry shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry<'a> {
    Input,
    Log { seed: &'a [u8], data: &'a [u8] },
    Output,
    Retire,
    Finalize,
    Other,
}

impl<'a> LogEntry<'a> {
    pub fn parse(tuple: &'a [Item]) -> Self {
        let code = match tuple.first().and_then(Item::as_bytes) {
            Some([code, ..]) => *code,
            _ => return LogEntry::Other,
        };
        match code {
            INPUT_CODE => LogEntry::Input,
            OUTPUT_CODE => LogEntry::Output,
            RETIRE_CODE => LogEntry::Retire,
            FINALIZE_CODE => LogEntry::Finalize,
            LOG_CODE => {
                match (
                    tuple.get(1).and_then(Item::as_bytes),
                    tuple.get(2).and_then(Item::as_bytes),
                ) {
                    (Some(seed), Some(data)) => LogEntry::Log { seed, data },
                    _ => LogEntry::Other,
                }
            }
            _ => LogEntry::Other,
        }
    }
}

/// Return the reference payload if `log` has the export transaction shape.
///
/// The shape is exactly 5 or 7 entries with:
/// `[0]` input, `[1]` log carrying the payload, `[len-3]` log tagged with
/// the export stage 1 seed, `[len-2]` output.
pub fn recognize_export<'a>(log: &'a [Vec<Item>], export_seed: &[u8; 32]) -> Option<&'a [u8]> {
    let n = log.len();
    if n != 5 && n != 7 {
        return None;
    }
    if LogEntry::parse(&log[0]) != LogEntry::Input {
        return None;
    }
    let payload = match LogEntry::parse(&log[1]) {
        LogEntry::Log { data, .. } => data,
        _ => return None,
    };
    if LogEntry::parse(&log[n - 2]) != LogEntry::Output {
        return None;
    }
    match LogEntry::parse(&log[n - 3]) {
        LogEntry::Log { seed, .. } if seed == export_seed.as_slice() => Some(payload),
        _ => None,
    }
}
