//! Peg Store — SQLite-backed pegs, cursor, exports and pins
//!
//! Every method runs one individually-committed statement under the
//! connection lock and returns a snapshot; callers never hold the lock
//! across an await point. Conditional updates return the number of rows
//! they touched so callers can detect lost or duplicated records.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::debug;

use types::ids::{Cursor, NonceHash, TxId};
use types::pegout::{ExportRecord, PegOut, PegOutState};
use types::errors::TypesError;

use crate::schema::init_schema;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ── Rows ────────────────────────────────────────────────────────────

/// A peg awaiting (or past) observation on the main ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PegRow {
    pub nonce_hash: NonceHash,
    pub amount: Option<i64>,
    pub asset_xdr: Option<Vec<u8>>,
    pub recipient_pubkey: Option<Vec<u8>>,
    pub observed_on_main: bool,
}

/// Raw export row; decoding is left to the caller, which decides how
/// severe a corrupt row is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub txid: TxId,
    pub pegout_json: Vec<u8>,
    pub pegged_out: i64,
    pub settled: bool,
}

impl ExportRow {
    pub fn decode(&self) -> Result<ExportRecord, TypesError> {
        Ok(ExportRecord {
            txid: self.txid,
            pegout: PegOut::from_json(&self.pegout_json)?,
            state: PegOutState::from_i64(self.pegged_out)?,
        })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn txid_from_row(bytes: Vec<u8>) -> StoreResult<TxId> {
    TxId::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn export_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Vec<u8>, Vec<u8>, i64, bool)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

// ── Store ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ── Pegs ────────────────────────────────────────────────────────

    /// Record a pending peg. Returns false if the nonce hash is already known.
    pub fn insert_peg(
        &self,
        nonce_hash: &NonceHash,
        amount: i64,
        asset_xdr: &[u8],
        recipient_pubkey: &[u8],
    ) -> StoreResult<bool> {
        let n = self.conn()?.execute(
            "INSERT INTO pegs (nonce_hash, amount, asset_xdr, recipient_pubkey, observed_on_main, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT(nonce_hash) DO NOTHING",
            params![nonce_hash.as_bytes().as_slice(), amount, asset_xdr, recipient_pubkey, now_millis()],
        )?;
        Ok(n == 1)
    }

    /// Mark a peg observed with the realized amount and asset.
    ///
    /// Only an unobserved row is updated, so of any number of concurrent
    /// callers for one nonce hash exactly one sees a count of 1.
    pub fn mark_peg_observed(
        &self,
        nonce_hash: &NonceHash,
        amount: i64,
        asset_xdr: &[u8],
    ) -> StoreResult<usize> {
        let n = self.conn()?.execute(
            "UPDATE pegs SET amount = ?1, asset_xdr = ?2, observed_on_main = 1
             WHERE nonce_hash = ?3 AND observed_on_main = 0",
            params![amount, asset_xdr, nonce_hash.as_bytes().as_slice()],
        )?;
        Ok(n)
    }

    pub fn peg(&self, nonce_hash: &NonceHash) -> StoreResult<Option<PegRow>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT amount, asset_xdr, recipient_pubkey, observed_on_main
                 FROM pegs WHERE nonce_hash = ?1",
                params![nonce_hash.as_bytes().as_slice()],
                |row| {
                    Ok(PegRow {
                        nonce_hash: *nonce_hash,
                        amount: row.get(0)?,
                        asset_xdr: row.get(1)?,
                        recipient_pubkey: row.get(2)?,
                        observed_on_main: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Observed pegs, oldest first; the import pipeline's work list
    pub fn observed_pegs(&self) -> StoreResult<Vec<PegRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT nonce_hash, amount, asset_xdr, recipient_pubkey
             FROM pegs WHERE observed_on_main = 1 ORDER BY created_at, nonce_hash",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                    row.get::<_, Option<Vec<u8>>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(hash, amount, asset_xdr, recipient_pubkey)| {
                Ok(PegRow {
                    nonce_hash: NonceHash::from_slice(&hash)
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?,
                    amount,
                    asset_xdr,
                    recipient_pubkey,
                    observed_on_main: true,
                })
            })
            .collect()
    }

    // ── Custodian cursor ────────────────────────────────────────────

    /// Create the custodian row if missing.
    pub fn ensure_custodian(&self, seed: &[u8]) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO custodian (seed, cursor) VALUES (?1, '') ON CONFLICT(seed) DO NOTHING",
            params![seed],
        )?;
        Ok(())
    }

    /// Persisted main-ledger cursor; the stream start if none was saved.
    pub fn cursor(&self, seed: &[u8]) -> StoreResult<Cursor> {
        let cursor: Option<String> = self
            .conn()?
            .query_row(
                "SELECT cursor FROM custodian WHERE seed = ?1",
                params![seed],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cursor.map(Cursor::new).unwrap_or_default())
    }

    pub fn set_cursor(&self, seed: &[u8], cursor: &Cursor) -> StoreResult<usize> {
        let n = self.conn()?.execute(
            "UPDATE custodian SET cursor = ?1 WHERE seed = ?2",
            params![cursor.as_str(), seed],
        )?;
        Ok(n)
    }

    // ── Exports ─────────────────────────────────────────────────────

    /// Record a recognized export in state not-yet. Returns false if the
    /// transaction was already recorded.
    pub fn insert_export(&self, txid: &TxId, pegout_json: &[u8]) -> StoreResult<bool> {
        let now = now_millis();
        let n = self.conn()?.execute(
            "INSERT INTO exports (txid, pegout_json, pegged_out, settled, recorded_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)
             ON CONFLICT(txid) DO NOTHING",
            params![
                txid.as_bytes().as_slice(),
                pegout_json,
                PegOutState::NotYet.as_i64(),
                now
            ],
        )?;
        if n == 0 {
            debug!(txid = %txid, "export already recorded");
        }
        Ok(n == 1)
    }

    fn exports_where(&self, sql: &str, a: i64, b: i64) -> StoreResult<Vec<ExportRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(params![a, b], export_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter()
            .map(|(txid, pegout_json, pegged_out, settled)| {
                Ok(ExportRow {
                    txid: txid_from_row(txid)?,
                    pegout_json,
                    pegged_out,
                    settled,
                })
            })
            .collect()
    }

    /// Exports eligible for (re)submission: not-yet or retry
    pub fn pending_exports(&self) -> StoreResult<Vec<ExportRow>> {
        self.exports_where(
            "SELECT txid, pegout_json, pegged_out, settled FROM exports
             WHERE pegged_out IN (?1, ?2) ORDER BY recorded_at, txid",
            PegOutState::NotYet.as_i64(),
            PegOutState::Retry.as_i64(),
        )
    }

    /// Exports with a terminal peg-out state whose settlement has not landed
    pub fn unsettled_pegouts(&self) -> StoreResult<Vec<ExportRow>> {
        self.exports_where(
            "SELECT txid, pegout_json, pegged_out, settled FROM exports
             WHERE pegged_out IN (?1, ?2) AND settled = 0 ORDER BY updated_at, txid",
            PegOutState::Ok.as_i64(),
            PegOutState::Fail.as_i64(),
        )
    }

    pub fn export(&self, txid: &TxId) -> StoreResult<Option<ExportRow>> {
        let raw = self
            .conn()?
            .query_row(
                "SELECT txid, pegout_json, pegged_out, settled FROM exports WHERE txid = ?1",
                params![txid.as_bytes().as_slice()],
                export_row,
            )
            .optional()?;
        raw.map(|(id, pegout_json, pegged_out, settled)| {
            Ok(ExportRow {
                txid: txid_from_row(id)?,
                pegout_json,
                pegged_out,
                settled,
            })
        })
        .transpose()
    }

    /// Move an export from `prior` to `next`. Returns the number of rows
    /// changed: 1 on success, 0 if the row is missing or not in `prior`.
    pub fn set_pegout_state(
        &self,
        txid: &TxId,
        prior: PegOutState,
        next: PegOutState,
    ) -> StoreResult<usize> {
        let n = self.conn()?.execute(
            "UPDATE exports SET pegged_out = ?1, updated_at = ?2
             WHERE txid = ?3 AND pegged_out = ?4",
            params![
                next.as_i64(),
                now_millis(),
                txid.as_bytes().as_slice(),
                prior.as_i64()
            ],
        )?;
        Ok(n)
    }

    /// Record that the side-ledger settlement of a terminal export landed.
    pub fn mark_settled(&self, txid: &TxId) -> StoreResult<usize> {
        let n = self.conn()?.execute(
            "UPDATE exports SET settled = 1, updated_at = ?1
             WHERE txid = ?2 AND settled = 0 AND pegged_out IN (?3, ?4)",
            params![
                now_millis(),
                txid.as_bytes().as_slice(),
                PegOutState::Ok.as_i64(),
                PegOutState::Fail.as_i64()
            ],
        )?;
        Ok(n)
    }

    // ── Pins ────────────────────────────────────────────────────────

    /// Last block height delivered to the named consumer
    pub fn pin_height(&self, name: &str) -> StoreResult<Option<u64>> {
        let height: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT height FROM pins WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        height
            .map(|h| u64::try_from(h).map_err(|_| StoreError::Corrupt(format!("pin {} height {}", name, h))))
            .transpose()
    }

    pub fn set_pin_height(&self, name: &str, height: u64) -> StoreResult<()> {
        let height = i64::try_from(height)
            .map_err(|_| StoreError::Corrupt(format!("pin {} height {}", name, height)))?;
        self.conn()?.execute(
            "INSERT INTO pins (name, height) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET height = excluded.height",
            params![name, height],
        )?;
        Ok(())
    }
}
