//! Schema — tables for pegs, the custodian cursor, exports and pins
//!
//! ```text
//! pegs       one row per pending or observed peg-in, keyed by nonce hash
//! custodian  one row per custodian identity, holding the main-ledger cursor
//! exports    one row per recognized export, keyed by side-ledger txid
//! pins       last delivered side-ledger block height per consumer
//! ```
//! `exports.pegged_out` holds the peg-out state code (0 not-yet, 1 ok,
//! 2 retry, 3 fail).

use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pegs (
    nonce_hash BLOB PRIMARY KEY,
    amount INTEGER,
    asset_xdr BLOB,
    recipient_pubkey BLOB,
    observed_on_main INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS custodian (
    seed BLOB PRIMARY KEY,
    cursor TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS exports (
    txid BLOB PRIMARY KEY,
    pegout_json BLOB NOT NULL,
    pegged_out INTEGER NOT NULL DEFAULT 0,
    settled INTEGER NOT NULL DEFAULT 0,
    recorded_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_exports_state ON exports(pegged_out, settled);

CREATE TABLE IF NOT EXISTS pins (
    name TEXT PRIMARY KEY,
    height INTEGER NOT NULL
);
";

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
