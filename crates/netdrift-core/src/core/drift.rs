// crates/netdrift-core/src/core/drift.rs
// ============================================================================
// Module: Netdrift Drift Events
// Description: Immutable drift event records.
// Purpose: Record each detected divergence between intent and actual state.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`DriftEvent`] records one detected mismatch between a stored intent and
//! the discovered configuration at a scope. Events are immutable and
//! append-only; netdrift never resolves or deletes them. Re-convergence is
//! inferred by consumers when later detections stop producing events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DeviceId;
use crate::core::identifiers::EventId;
use crate::core::scope::IntentScope;
use crate::core::time::Timestamp;
use crate::diff::DiffEntry;
use crate::hashing::HashDigest;

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// Kind of event delivered to webhook subscribers.
///
/// # Invariants
/// - Variants are stable wire values; subscribers filter on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A divergence between intent and discovered configuration was detected.
    DriftDetected,
}

// ============================================================================
// SECTION: Drift Event
// ============================================================================

/// One detected divergence between intent and discovered configuration.
///
/// # Invariants
/// - Immutable once created; the event log is append-only.
/// - `previous_hash` is the stored intent's hash and `current_hash` the
///   discovered scope's hash at detection time; they always differ.
/// - `diff` is non-empty; an empty diff alongside differing hashes is a
///   fatal invariant violation and such an event is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftEvent {
    /// Unique event identifier.
    pub event_id: EventId,
    /// Device the drift was detected on.
    pub device_id: DeviceId,
    /// Intent scope that drifted.
    pub scope: IntentScope,
    /// Hash of the stored intent content.
    pub previous_hash: HashDigest,
    /// Hash of the discovered scope content.
    pub current_hash: HashDigest,
    /// Structural delta from intent to discovered state.
    pub diff: Vec<DiffEntry>,
    /// When the divergence was detected.
    pub detected_at: Timestamp,
}

impl DriftEvent {
    /// Returns the event type; every drift event is currently
    /// [`EventType::DriftDetected`].
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        EventType::DriftDetected
    }
}
