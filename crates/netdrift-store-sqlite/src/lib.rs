// crates/netdrift-store-sqlite/src/lib.rs
// ============================================================================
// Module: Netdrift SQLite Store
// Description: Durable implementations of the netdrift storage interfaces.
// Purpose: Persist intents, snapshots, events, and deliveries across restart.
// Dependencies: netdrift-core, rusqlite, serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! One SQLite database (WAL mode by default) backs all five storage
//! interfaces from `netdrift-core`. Intent versions live in an append-only
//! table; events and deliveries are never deleted; the delivery queue's FIFO
//! order is the insertion rowid. A process restart resumes exactly where the
//! previous one stopped, including pending webhook deliveries.

pub mod store;

pub use store::SqliteJournalMode;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
