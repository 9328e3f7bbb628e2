// crates/netdrift-core/src/interfaces/mod.rs
// ============================================================================
// Module: Netdrift Storage Interfaces
// Description: Backend-agnostic contracts for intents, snapshots, events,
//              subscriptions, and deliveries.
// Purpose: Let the detector and dispatcher run against any storage backend.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Five traits define the storage seam: [`IntentStore`], [`SnapshotStore`],
//! [`DriftEventLog`], [`SubscriptionRegistry`], and [`DeliveryQueue`]. The
//! in-memory reference implementation lives in [`crate::store`]; the durable
//! SQLite implementation lives in its own crate. Every method returns
//! [`StoreError`] so callers handle one taxonomy regardless of backend.
//!
//! Contract notes that hold for all implementations:
//! - `put_intent` canonicalizes and hashes inside the store so the persisted
//!   `(canonical_content, content_hash, version)` triple is always coherent.
//! - Writes for one `(device, scope)` pair are linearized; distinct pairs
//!   proceed independently.
//! - Event and delivery rows are append-only: status fields change, rows are
//!   never deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::canonical::CanonicalizationError;
use crate::core::drift::DriftEvent;
use crate::core::identifiers::DeliveryId;
use crate::core::identifiers::DeviceId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::SubscriptionId;
use crate::core::identifiers::ValidationError;
use crate::core::intent::ConfigSnapshot;
use crate::core::intent::IntentRecord;
use crate::core::scope::IntentScope;
use crate::core::time::Timestamp;
use crate::core::webhook::DeliveryStatus;
use crate::core::webhook::WebhookDelivery;
use crate::core::webhook::WebhookSubscription;
use crate::hashing::HashError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage-seam failure taxonomy shared by every backend.
///
/// # Invariants
/// - Variants are stable for programmatic handling; the HTTP layer maps them
///   to status codes (`Validation` 400, `*NotFound` 404, `VersionConflict`
///   409, `Canonicalization` 422, the rest 500).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An identifier or input field failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A payload failed structural canonicalization.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
    /// Content hashing failed.
    #[error(transparent)]
    Hashing(#[from] HashError),
    /// No active intent exists for the `(device, scope)` pair.
    #[error("no intent for device '{device_id}' at scope '{scope}'")]
    IntentNotFound {
        /// Device addressed by the caller.
        device_id: String,
        /// Scope storage key addressed by the caller.
        scope: String,
    },
    /// An optimistic-concurrency write observed an unexpected version.
    #[error(
        "version conflict for device '{device_id}' at scope '{scope}': \
         expected {expected}, actual {actual}"
    )]
    VersionConflict {
        /// Device addressed by the caller.
        device_id: String,
        /// Scope storage key addressed by the caller.
        scope: String,
        /// Version the caller expected.
        expected: u64,
        /// Version the store holds.
        actual: u64,
    },
    /// The subscription does not exist.
    #[error("subscription '{subscription_id}' not found")]
    SubscriptionNotFound {
        /// Subscription addressed by the caller.
        subscription_id: String,
    },
    /// The delivery does not exist.
    #[error("delivery '{delivery_id}' not found")]
    DeliveryNotFound {
        /// Delivery addressed by the caller.
        delivery_id: String,
    },
    /// Replay was requested for a delivery that is not dead-lettered.
    #[error("delivery '{delivery_id}' cannot be replayed from status {status:?}")]
    NotReplayable {
        /// Delivery addressed by the caller.
        delivery_id: String,
        /// Status the delivery currently holds.
        status: DeliveryStatus,
    },
    /// Underlying storage I/O failed.
    #[error("storage failure: {0}")]
    Io(String),
    /// Stored data failed to decode, indicating corruption.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Intent Store
// ============================================================================

/// Stores user-declared configuration intent per `(device, scope)` pair.
pub trait IntentStore: Send + Sync {
    /// Canonicalizes, hashes, and writes an intent.
    ///
    /// A fresh pair starts at version 1; an existing pair increments. When
    /// `expected_version` is given the write only proceeds if it matches the
    /// current version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Canonicalization`] on a malformed payload,
    /// [`StoreError::VersionConflict`] on a version mismatch (no write
    /// occurs), and backend errors otherwise.
    fn put_intent(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
        raw_content: &Value,
        expected_version: Option<u64>,
    ) -> Result<IntentRecord, StoreError>;

    /// Fetches the active intent for a `(device, scope)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IntentNotFound`] when no active intent exists.
    fn get_intent(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<IntentRecord, StoreError>;

    /// Lists all active intents for a device, ordered by scope storage key.
    ///
    /// # Errors
    ///
    /// Returns backend errors only; an unknown device yields an empty list.
    fn list_intents(&self, device_id: &DeviceId) -> Result<Vec<IntentRecord>, StoreError>;

    /// Deactivates the intent for a `(device, scope)` pair.
    ///
    /// History is retained; a later `put_intent` for the same pair continues
    /// the version sequence rather than restarting at 1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IntentNotFound`] when no active intent exists.
    fn delete_intent(&self, device_id: &DeviceId, scope: &IntentScope) -> Result<(), StoreError>;

    /// Returns every retained version for a `(device, scope)` pair, oldest
    /// first, including versions of deleted scopes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IntentNotFound`] when the pair has never been
    /// written.
    fn intent_history(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<Vec<IntentRecord>, StoreError>;

    /// Probes backend readiness, for health checks.
    ///
    /// # Errors
    ///
    /// Returns a backend error when storage is unreachable.
    fn readiness(&self) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

/// Stores the most recent discovered configuration per device.
pub trait SnapshotStore: Send + Sync {
    /// Replaces the device's snapshot.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn put_snapshot(&self, snapshot: &ConfigSnapshot) -> Result<(), StoreError>;

    /// Fetches the device's snapshot, if one has been ingested.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn get_snapshot(&self, device_id: &DeviceId) -> Result<Option<ConfigSnapshot>, StoreError>;
}

// ============================================================================
// SECTION: Drift Event Log
// ============================================================================

/// Append-only log of detected drift events.
pub trait DriftEventLog: Send + Sync {
    /// Appends one event.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn append_event(&self, event: &DriftEvent) -> Result<(), StoreError>;

    /// Fetches one event by identifier.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn get_event(&self, event_id: &EventId) -> Result<Option<DriftEvent>, StoreError>;

    /// Lists a device's events, newest first.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn events_for_device(&self, device_id: &DeviceId) -> Result<Vec<DriftEvent>, StoreError>;

    /// Lists a device's events for one scope, newest first.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn events_for_scope(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<Vec<DriftEvent>, StoreError>;
}

// ============================================================================
// SECTION: Subscription Registry
// ============================================================================

/// Stores webhook subscriptions.
pub trait SubscriptionRegistry: Send + Sync {
    /// Inserts a new subscription.
    ///
    /// # Errors
    ///
    /// Returns backend errors only; identifier collisions cannot occur with
    /// generated UUIDs.
    fn insert_subscription(&self, subscription: &WebhookSubscription) -> Result<(), StoreError>;

    /// Fetches one subscription by identifier, active or not.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<WebhookSubscription>, StoreError>;

    /// Lists all active subscriptions.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn active_subscriptions(&self) -> Result<Vec<WebhookSubscription>, StoreError>;

    /// Marks a subscription inactive. The row is retained so in-flight
    /// delivery attempts can observe the deactivation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SubscriptionNotFound`] when absent.
    fn deactivate_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Delivery Queue
// ============================================================================

/// Durable at-least-once webhook delivery queue.
pub trait DeliveryQueue: Send + Sync {
    /// Persists a new pending delivery.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn enqueue_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError>;

    /// Returns up to `limit` deliveries due at `now`, at most one per
    /// subscription, in enqueue order per subscription (FIFO).
    ///
    /// Deliveries in `Succeeded` or `DeadLettered` status are never due.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn due_deliveries(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    /// Fetches one delivery by identifier.
    ///
    /// # Errors
    ///
    /// Returns backend errors only.
    fn get_delivery(&self, delivery_id: &DeliveryId) -> Result<Option<WebhookDelivery>, StoreError>;

    /// Records a successful attempt, settling the delivery.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeliveryNotFound`] when absent.
    fn mark_succeeded(&self, delivery_id: &DeliveryId, attempt_count: u32)
    -> Result<(), StoreError>;

    /// Records a failed attempt and schedules the next one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeliveryNotFound`] when absent.
    fn mark_retry(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
        next_attempt_at: Timestamp,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Records a final failed attempt, dead-lettering the delivery.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeliveryNotFound`] when absent.
    fn mark_dead_lettered(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Moves a dead-lettered delivery back to pending, due at `now`.
    ///
    /// `attempt_count` is preserved so the audit trail keeps the full attempt
    /// history across replays.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeliveryNotFound`] when absent and
    /// [`StoreError::NotReplayable`] when the delivery is not dead-lettered.
    fn replay_delivery(
        &self,
        delivery_id: &DeliveryId,
        now: Timestamp,
    ) -> Result<WebhookDelivery, StoreError>;
}
