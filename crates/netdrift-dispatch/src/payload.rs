// crates/netdrift-dispatch/src/payload.rs
// ============================================================================
// Module: Webhook Payload
// Description: Wire shape of the drift event body POSTed to subscribers.
// Purpose: Keep the delivered JSON shape stable and independent of internal
//          record layouts.
// Dependencies: netdrift-core, serde, serde_json
// ============================================================================

//! ## Overview
//! [`WebhookPayload`] is the body subscribers receive. It is built from the
//! persisted [`DriftEvent`] at send time, so a replayed delivery always
//! carries the event as it was detected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use netdrift_core::DiffEntry;
use netdrift_core::DriftEvent;
use netdrift_core::HashDigest;
use netdrift_core::IntentScope;
use netdrift_core::Timestamp;
use netdrift_core::core::identifiers::DeviceId;
use netdrift_core::core::identifiers::EventId;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Body of one webhook POST.
///
/// # Invariants
/// - Field values are copied verbatim from the persisted event; retries and
///   replays of a delivery serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Identifier of the drift event.
    pub event_id: EventId,
    /// Device the drift was detected on.
    pub device_id: DeviceId,
    /// Scope of the drifted intent.
    pub scope: IntentScope,
    /// Intent-side content hash.
    pub previous_hash: HashDigest,
    /// Discovered-side content hash.
    pub current_hash: HashDigest,
    /// Structural explanation of the drift.
    pub diff: Vec<DiffEntry>,
    /// When the drift was detected (unix-epoch milliseconds).
    pub detected_at: Timestamp,
}

impl WebhookPayload {
    /// Builds the payload from a persisted event.
    #[must_use]
    pub fn from_event(event: &DriftEvent) -> Self {
        Self {
            event_id: event.event_id,
            device_id: event.device_id.clone(),
            scope: event.scope.clone(),
            previous_hash: event.previous_hash.clone(),
            current_hash: event.current_hash.clone(),
            diff: event.diff.clone(),
            detected_at: event.detected_at,
        }
    }

    /// Serializes the payload to the exact bytes sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when a diff value cannot be encoded,
    /// which cannot happen for payloads built from persisted events.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
