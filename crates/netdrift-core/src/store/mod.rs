// crates/netdrift-core/src/store/mod.rs
// ============================================================================
// Module: Netdrift In-Memory Store
// Description: Reference implementations of the storage interfaces.
// Purpose: Back tests and embedded use without a database file.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`MemoryStore`] implements every interface in [`crate::interfaces`] over
//! process-local collections. It is the reference implementation the durable
//! SQLite backend is tested against, and the default backend for tests that
//! do not exercise durability.

mod memory;

pub use memory::MemoryStore;
