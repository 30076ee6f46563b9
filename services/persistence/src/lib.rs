//! Persisted Peg Store
//!
//! Relational state shared by every custodian task: pending and observed
//! pegs, the main-ledger cursor, recognized exports with their peg-out
//! state, and side-ledger pin heights.
//!
//! The store is the only synchronization point for durable state. Each
//! accessor is a single committed statement; conditional updates report
//! affected rows so callers can enforce exactly-once transitions.

pub mod schema;
pub mod store;

pub use store::{ExportRow, PegRow, Store, StoreError, StoreResult};
