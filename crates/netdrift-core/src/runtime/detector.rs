// crates/netdrift-core/src/runtime/detector.rs
// ============================================================================
// Module: Netdrift Drift Detector
// Description: Snapshot ingestion and per-scope drift comparison.
// Purpose: Turn hash mismatches into persisted, explained drift events.
// Dependencies: serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`DriftDetector::process_snapshot`] canonicalizes and persists a device
//! snapshot, then walks the device's active intents. Each intent's scope is
//! sliced out of the snapshot and hash-compared; a mismatch produces a
//! [`DriftEvent`] carrying a structural diff. A scope missing from the
//! snapshot is itself drift: the detector records the extraction failure and
//! emits an event with an implicit whole-scope removal.
//!
//! Detection never mutates intent records and never infers resolution: the
//! event log is append-only, and a later matching snapshot simply produces
//! no new event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::canonical::CanonicalTree;
use crate::canonical::CanonicalizationError;
use crate::canonical::ScopeExtractionError;
use crate::core::drift::DriftEvent;
use crate::core::identifiers::DeviceId;
use crate::core::identifiers::EventId;
use crate::core::intent::ConfigSnapshot;
use crate::core::intent::IntentRecord;
use crate::core::scope::IntentScope;
use crate::core::time::Timestamp;
use crate::diff::DiffEntry;
use crate::diff::DiffError;
use crate::diff::DiffPath;
use crate::diff::diff_trees;
use crate::hashing::DEFAULT_HASH_ALGORITHM;
use crate::hashing::HashError;
use crate::hashing::hash_canonical_json;
use crate::hashing::hash_tree;
use crate::interfaces::DriftEventLog;
use crate::interfaces::IntentStore;
use crate::interfaces::SnapshotStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Detection failure.
///
/// Scope extraction failures are *not* errors — they are drift, recorded on
/// the outcome. These variants are system failures that abort the snapshot.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The raw payload failed structural canonicalization.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
    /// Content hashing failed.
    #[error(transparent)]
    Hashing(#[from] HashError),
    /// Diff computation failed on stored content.
    #[error(transparent)]
    Diff(#[from] DiffError),
    /// A storage operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// A hash/diff consistency violation observed while building an event.
///
/// Differing hashes must come with a non-empty diff. A violation means the
/// canonicalizer and differ disagree about equivalence; the event is dropped
/// rather than delivered with an empty explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Scope whose event was dropped.
    pub scope: IntentScope,
    /// Human-readable description of the inconsistency.
    pub reason: String,
}

/// Result of processing one snapshot.
#[derive(Debug)]
pub struct SnapshotOutcome {
    /// The persisted snapshot record.
    pub snapshot: ConfigSnapshot,
    /// Drift events produced, in intent listing order. Possibly empty.
    pub events: Vec<DriftEvent>,
    /// Scopes that could not be extracted from the snapshot. Each also
    /// produced a whole-scope removal event in `events`.
    pub extraction_failures: Vec<ScopeExtractionError>,
    /// Events dropped for violating the hash/diff consistency invariant.
    pub invariant_violations: Vec<InvariantViolation>,
}

// ============================================================================
// SECTION: Notifier Seam
// ============================================================================

/// Receives persisted drift events for asynchronous fan-out.
///
/// The dispatcher implements this by enqueueing one delivery per matching
/// subscription. Implementations must only persist state — never block on or
/// fail because of remote endpoints.
pub trait DriftNotifier: Send + Sync {
    /// Hands one persisted event to the notifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persisting delivery state fails.
    fn notify(&self, event: &DriftEvent) -> Result<(), StoreError>;
}

/// Notifier that drops every event, for embedded use and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl DriftNotifier for NullNotifier {
    fn notify(&self, _event: &DriftEvent) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Detector
// ============================================================================

/// Compares ingested snapshots against stored intent.
pub struct DriftDetector {
    /// Intent records to compare against.
    intents: Arc<dyn IntentStore>,
    /// Snapshot persistence.
    snapshots: Arc<dyn SnapshotStore>,
    /// Append-only event log.
    events: Arc<dyn DriftEventLog>,
    /// Fan-out hook invoked after each event is persisted.
    notifier: Arc<dyn DriftNotifier>,
}

impl DriftDetector {
    /// Creates a detector over the given storage seams.
    #[must_use]
    pub fn new(
        intents: Arc<dyn IntentStore>,
        snapshots: Arc<dyn SnapshotStore>,
        events: Arc<dyn DriftEventLog>,
        notifier: Arc<dyn DriftNotifier>,
    ) -> Self {
        Self {
            intents,
            snapshots,
            events,
            notifier,
        }
    }

    /// Ingests a discovered configuration and detects drift for every active
    /// intent of the device.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError`] when the payload is structurally invalid or
    /// a storage operation fails. Scope extraction failures do not error;
    /// they are recorded on the outcome.
    pub fn process_snapshot(
        &self,
        device_id: &DeviceId,
        raw_content: &Value,
    ) -> Result<SnapshotOutcome, DetectorError> {
        let tree = CanonicalTree::canonicalize(raw_content)?;
        let canonical_content = tree.to_canonical_json()?;
        let content_hash = hash_tree(&tree)?;
        let now = Timestamp::now();
        let snapshot = ConfigSnapshot {
            device_id: device_id.clone(),
            canonical_content,
            content_hash,
            fetched_at: now,
        };
        self.snapshots.put_snapshot(&snapshot)?;

        let mut outcome = SnapshotOutcome {
            snapshot,
            events: Vec::new(),
            extraction_failures: Vec::new(),
            invariant_violations: Vec::new(),
        };
        for record in self.intents.list_intents(device_id)? {
            self.detect_for_intent(&record, &tree, now, &mut outcome)?;
        }
        info!(
            device = %device_id,
            events = outcome.events.len(),
            extraction_failures = outcome.extraction_failures.len(),
            "snapshot processed"
        );
        Ok(outcome)
    }

    /// Compares one intent against its slice of the snapshot tree.
    fn detect_for_intent(
        &self,
        record: &IntentRecord,
        snapshot_tree: &CanonicalTree,
        now: Timestamp,
        outcome: &mut SnapshotOutcome,
    ) -> Result<(), DetectorError> {
        let slice = match &record.scope {
            IntentScope::Full => Ok(snapshot_tree.clone()),
            IntentScope::Partial(path) => snapshot_tree.slice(path),
        };
        let event = match slice {
            Ok(slice) => {
                let current_hash = hash_tree(&slice)?;
                if current_hash == record.content_hash {
                    return Ok(());
                }
                let intent_tree = record.canonical_tree()?;
                let diff = diff_trees(&intent_tree, &slice)?;
                if diff.is_empty() {
                    // Differing hashes with an empty diff means the
                    // canonicalizer and differ disagree; drop the event.
                    error!(
                        device = %record.device_id,
                        scope = %record.scope.storage_key(),
                        previous = %record.content_hash,
                        current = %current_hash,
                        "hash mismatch produced an empty diff; event dropped"
                    );
                    outcome.invariant_violations.push(InvariantViolation {
                        scope: record.scope.clone(),
                        reason: "hash mismatch produced an empty diff".to_string(),
                    });
                    return Ok(());
                }
                DriftEvent {
                    event_id: EventId::generate(),
                    device_id: record.device_id.clone(),
                    scope: record.scope.clone(),
                    previous_hash: record.content_hash.clone(),
                    current_hash,
                    diff,
                    detected_at: now,
                }
            }
            Err(extraction) => {
                // A scope absent from the discovered configuration is drift:
                // the intended subtree was removed from the device.
                warn!(
                    device = %record.device_id,
                    scope = %record.scope.storage_key(),
                    reason = %extraction,
                    "intent scope missing from snapshot"
                );
                outcome.extraction_failures.push(extraction);
                let intent_tree = record.canonical_tree()?;
                let current_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &Value::Null)?;
                DriftEvent {
                    event_id: EventId::generate(),
                    device_id: record.device_id.clone(),
                    scope: record.scope.clone(),
                    previous_hash: record.content_hash.clone(),
                    current_hash,
                    diff: vec![DiffEntry::removed(
                        DiffPath::default(),
                        intent_tree.into_value(),
                    )],
                    detected_at: now,
                }
            }
        };
        info!(
            device = %event.device_id,
            scope = %event.scope.storage_key(),
            event_id = %event.event_id,
            changes = event.diff.len(),
            "drift detected"
        );
        self.events.append_event(&event)?;
        self.notifier.notify(&event)?;
        outcome.events.push(event);
        Ok(())
    }
}
