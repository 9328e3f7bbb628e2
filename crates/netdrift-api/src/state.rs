// crates/netdrift-api/src/state.rs
// ============================================================================
// Module: Shared Application State
// Description: Handles and seams shared by every route handler.
// Purpose: One cheaply-cloned bundle of storage seams, detector, and
//          dispatcher for axum state extraction.
// Dependencies: netdrift-core, netdrift-dispatch
// ============================================================================

//! ## Overview
//! [`AppState`] is cloned into every handler invocation. All members are
//! reference-counted handles over one shared store, so clones are cheap and
//! every route observes the same data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use netdrift_core::DeliveryQueue;
use netdrift_core::DriftDetector;
use netdrift_core::DriftEventLog;
use netdrift_core::IntentStore;
use netdrift_dispatch::Dispatcher;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Intent reads and writes.
    pub intents: Arc<dyn IntentStore>,
    /// Drift event history reads.
    pub events: Arc<dyn DriftEventLog>,
    /// Delivery lookups.
    pub queue: Arc<dyn DeliveryQueue>,
    /// Snapshot ingestion and drift detection.
    pub detector: Arc<DriftDetector>,
    /// Webhook subscription management and replay.
    pub dispatcher: Dispatcher,
}
