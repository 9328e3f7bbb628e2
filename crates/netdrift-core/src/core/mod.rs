// crates/netdrift-core/src/core/mod.rs
// ============================================================================
// Module: Netdrift Core Data Model
// Description: Identifiers, scopes, timestamps, and record types.
// Purpose: Define the data model shared by every netdrift component.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! The data model is record-shaped and serializable: strongly typed
//! identifiers, intent scopes with structured paths, intent and snapshot
//! records, drift events, and webhook subscription/delivery records.

pub mod drift;
pub mod identifiers;
pub mod intent;
pub mod scope;
pub mod time;
pub mod webhook;
