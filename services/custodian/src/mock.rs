//! In-memory ledgers for tests and local runs
//!
//! `MockMainLedger` keeps per-account transaction history with numeric
//! paging tokens and scripted submission results. `MockSideLedger` keeps
//! a block list and derives transaction ids from the program text up to
//! `finalize`, which is enough for the custodian's dry-run then sign flow.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sha2::{Digest, Sha256};

use programs::opcodes::{decode, Instruction, Opcode};
use types::account::Address;
use types::ids::{Cursor, TxId};
use types::transaction::{OperationBody, SignedTransaction};
use types::xdr::XdrEncode;

use crate::ledger::{
    Block, BlockTx, DryRun, LedgerError, MainLedgerClient, SettlementError, SideLedgerClient,
    SideTx, StreamedTx, SubmitError, SubmitResult,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Main ledger ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MainState {
    history: Vec<(Address, u64, Vec<u8>)>,
    next_token: u64,
    ledger: u64,
    submitted: Vec<SignedTransaction>,
    responses: VecDeque<Result<SubmitResult, SubmitError>>,
    sequences: HashMap<Address, u64>,
    failing_streams: usize,
    stream_opens: Vec<Cursor>,
}

#[derive(Debug, Default)]
pub struct MockMainLedger {
    state: Mutex<MainState>,
}

impl MockMainLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction to `account`'s history; returns its paging token.
    pub fn push_transaction(&self, account: Address, envelope: &SignedTransaction) -> Cursor {
        self.push_raw(account, envelope.to_xdr())
    }

    pub fn push_raw(&self, account: Address, envelope_xdr: Vec<u8>) -> Cursor {
        let mut s = lock(&self.state);
        s.next_token += 1;
        let token = s.next_token;
        s.history.push((account, token, envelope_xdr));
        Cursor::new(token.to_string())
    }

    /// Queue the result of the next `submit`; unscripted submits succeed.
    pub fn script_submit(&self, result: Result<SubmitResult, SubmitError>) {
        lock(&self.state).responses.push_back(result);
    }

    pub fn set_sequence(&self, account: Address, seq: u64) {
        lock(&self.state).sequences.insert(account, seq);
    }

    /// Make the next `n` stream opens fail immediately.
    pub fn fail_next_streams(&self, n: usize) {
        lock(&self.state).failing_streams = n;
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        lock(&self.state).submitted.clone()
    }

    /// Cursors passed to `stream_transactions`, in call order.
    pub fn stream_opens(&self) -> Vec<Cursor> {
        lock(&self.state).stream_opens.clone()
    }
}

#[async_trait]
impl MainLedgerClient for MockMainLedger {
    async fn submit(&self, tx: &SignedTransaction) -> Result<SubmitResult, SubmitError> {
        let mut s = lock(&self.state);
        s.submitted.push(tx.clone());
        let result = s.responses.pop_front().unwrap_or_else(|| {
            Ok(SubmitResult {
                hash: [0; 32],
                ledger: 0,
            })
        });
        if result.is_err() {
            return result;
        }
        s.ledger += 1;
        let ledger = s.ledger;
        s.sequences.insert(tx.tx.source, tx.tx.seq_num as u64);
        for op in &tx.tx.operations {
            if let OperationBody::CreateAccount { destination, .. } = &op.body {
                s.sequences.insert(*destination, ledger << 32);
            }
        }
        result.map(|r| SubmitResult { ledger, ..r })
    }

    fn stream_transactions(
        &self,
        account: &Address,
        cursor: Cursor,
    ) -> BoxStream<'static, Result<StreamedTx, LedgerError>> {
        let mut s = lock(&self.state);
        s.stream_opens.push(cursor.clone());
        if s.failing_streams > 0 {
            s.failing_streams -= 1;
            return stream::iter(vec![Err(LedgerError::Transport("stream reset".into()))]).boxed();
        }
        let after = if cursor.is_start() {
            0
        } else {
            match cursor.as_str().parse::<u64>() {
                Ok(t) => t,
                Err(_) => {
                    return stream::iter(vec![Err(LedgerError::Malformed(format!(
                        "bad cursor {cursor}"
                    )))])
                    .boxed()
                }
            }
        };
        let items: Vec<_> = s
            .history
            .iter()
            .filter(|(a, token, _)| a == account && *token > after)
            .map(|(_, token, xdr)| {
                Ok(StreamedTx {
                    paging_token: Cursor::new(token.to_string()),
                    envelope_xdr: xdr.clone(),
                })
            })
            .collect();
        stream::iter(items).boxed()
    }

    async fn sequence_number(&self, account: &Address) -> Result<u64, LedgerError> {
        lock(&self.state)
            .sequences
            .get(account)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }
}

// ── Side ledger ─────────────────────────────────────────────────────

const RUNLIMIT_PER_BYTE: i64 = 16;

/// Transaction id of `program`: a digest of its instructions through the
/// first `finalize`.
pub fn mock_txid(program: &[u8]) -> Result<TxId, LedgerError> {
    let instructions = decode(program).map_err(|e| LedgerError::Malformed(e.to_string()))?;
    let mut hasher = Sha256::new();
    for ins in &instructions {
        hasher.update(format!("{ins:?}").as_bytes());
        if *ins == Instruction::Op(Opcode::Finalize) {
            return Ok(TxId::new(hasher.finalize().into()));
        }
    }
    Err(LedgerError::Malformed("program does not finalize".into()))
}

#[derive(Debug, Default)]
struct SideState {
    blocks: Vec<Block>,
    submitted: Vec<SideTx>,
    responses: VecDeque<Result<TxId, SettlementError>>,
    failing_dry_runs: usize,
    blocks_from_calls: Vec<u64>,
}

#[derive(Debug, Default)]
pub struct MockSideLedger {
    state: Mutex<SideState>,
}

impl MockSideLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block; returns its height.
    pub fn push_block(&self, transactions: Vec<BlockTx>) -> u64 {
        let mut s = lock(&self.state);
        let height = s.blocks.len() as u64 + 1;
        s.blocks.push(Block {
            height,
            transactions,
        });
        height
    }

    pub fn script_submit(&self, result: Result<TxId, SettlementError>) {
        lock(&self.state).responses.push_back(result);
    }

    pub fn fail_next_dry_runs(&self, n: usize) {
        lock(&self.state).failing_dry_runs = n;
    }

    pub fn submitted(&self) -> Vec<SideTx> {
        lock(&self.state).submitted.clone()
    }

    pub fn blocks_from_calls(&self) -> Vec<u64> {
        lock(&self.state).blocks_from_calls.clone()
    }
}

#[async_trait]
impl SideLedgerClient for MockSideLedger {
    fn blocks_from(&self, height: u64) -> BoxStream<'static, Result<Block, LedgerError>> {
        let mut s = lock(&self.state);
        s.blocks_from_calls.push(height);
        let blocks: Vec<_> = s
            .blocks
            .iter()
            .filter(|b| b.height >= height)
            .cloned()
            .map(Ok)
            .collect();
        stream::iter(blocks).boxed()
    }

    async fn dry_run(&self, program: &[u8]) -> Result<DryRun, LedgerError> {
        {
            let mut s = lock(&self.state);
            if s.failing_dry_runs > 0 {
                s.failing_dry_runs -= 1;
                return Err(LedgerError::Transport("dry run unavailable".into()));
            }
        }
        Ok(DryRun {
            txid: mock_txid(program)?,
            runlimit: program.len() as i64 * RUNLIMIT_PER_BYTE,
        })
    }

    async fn submit(&self, tx: &SideTx) -> Result<TxId, SettlementError> {
        let mut s = lock(&self.state);
        s.submitted.push(tx.clone());
        match s.responses.pop_front() {
            Some(result) => result,
            None => Ok(mock_txid(&tx.program)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use programs::Builder;

    #[test]
    fn test_mock_txid_ignores_suffix_after_finalize() {
        let prefix = Builder::new().int(1).finalize().build().unwrap();
        let mut full = prefix.clone();
        full.extend(Builder::new().push(b"sig").put().call().build().unwrap());
        assert_eq!(mock_txid(&prefix).unwrap(), mock_txid(&full).unwrap());
    }

    #[test]
    fn test_mock_txid_requires_finalize() {
        let prog = Builder::new().int(1).build().unwrap();
        assert!(mock_txid(&prog).is_err());
    }

    #[tokio::test]
    async fn test_stream_resumes_after_cursor() {
        let main = MockMainLedger::new();
        let account = Address::from_public_key([1; 32]);
        let other = Address::from_public_key([2; 32]);
        main.push_raw(account, vec![1]);
        let second = main.push_raw(account, vec![2]);
        main.push_raw(other, vec![3]);
        main.push_raw(account, vec![4]);

        let all: Vec<_> = main.stream_transactions(&account, Cursor::default()).collect().await;
        assert_eq!(all.len(), 3);

        let rest: Vec<_> = main.stream_transactions(&account, second).collect().await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].as_ref().unwrap().envelope_xdr, vec![4]);
    }
}
