// crates/netdrift-core/src/core/webhook.rs
// ============================================================================
// Module: Netdrift Webhook Records
// Description: Webhook subscription and delivery records.
// Purpose: Define the shapes persisted by the subscription registry and queue.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`WebhookSubscription`] registers an endpoint for drift notifications;
//! a [`WebhookDelivery`] tracks one at-least-once delivery of one event to
//! one subscription. Delivery rows are never deleted — dead-lettered
//! deliveries stay queryable for audit and manual replay.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DeliveryId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::SubscriptionId;
use crate::core::scope::IntentScope;
use crate::core::scope::ScopePath;
use crate::core::time::Timestamp;
use crate::core::drift::EventType;

// ============================================================================
// SECTION: Scope Filter
// ============================================================================

/// Subscription filter over event scopes.
///
/// # Invariants
/// - `Any` matches every scope; `Full` matches only full-intent events;
///   `Partial` matches partial events with an equal path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ScopeFilter {
    /// Match events for any scope.
    #[default]
    Any,
    /// Match only full-intent events.
    Full,
    /// Match partial-intent events with exactly this path.
    Partial(ScopePath),
}

impl ScopeFilter {
    /// Returns true when the filter matches the event scope.
    #[must_use]
    pub fn matches(&self, scope: &IntentScope) -> bool {
        match (self, scope) {
            (Self::Any, _) | (Self::Full, IntentScope::Full) => true,
            (Self::Partial(filter), IntentScope::Partial(path)) => filter == path,
            (Self::Full, IntentScope::Partial(_)) | (Self::Partial(_), IntentScope::Full) => false,
        }
    }
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// A registered webhook endpoint.
///
/// # Invariants
/// - `url` is http(s) and `secret` is non-empty, validated at subscribe time.
/// - Unsubscribing clears `active` but retains the row so in-flight delivery
///   attempts can observe the deactivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Unique subscription identifier.
    pub subscription_id: SubscriptionId,
    /// Endpoint URL receiving event payloads.
    pub url: String,
    /// Shared secret used to sign payloads (HMAC-SHA256).
    pub secret: String,
    /// Scope filter applied to events before enqueueing deliveries.
    pub scope_filter: ScopeFilter,
    /// Event types this subscription receives.
    pub event_types: Vec<EventType>,
    /// Whether the subscription accepts new delivery attempts.
    pub active: bool,
}

impl WebhookSubscription {
    /// Returns true when this subscription should receive the given event
    /// scope and type.
    #[must_use]
    pub fn wants(&self, scope: &IntentScope, event_type: EventType) -> bool {
        self.active && self.scope_filter.matches(scope) && self.event_types.contains(&event_type)
    }
}

// ============================================================================
// SECTION: Delivery
// ============================================================================

/// Lifecycle state of one webhook delivery.
///
/// # Invariants
/// - `Succeeded` and `DeadLettered` are terminal for automatic processing;
///   only manual replay moves a dead-lettered delivery back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Waiting for a first attempt (or replayed).
    Pending,
    /// Delivered; subscriber acknowledged with a success status.
    Succeeded,
    /// Last attempt failed; a retry is scheduled.
    Failed,
    /// Retry budget exhausted; retained for audit and manual replay.
    DeadLettered,
}

/// One at-least-once delivery of one event to one subscription.
///
/// # Invariants
/// - `(event_id, subscription_id)` is the idempotency key and is identical
///   across every retry of this delivery.
/// - Rows are never deleted, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// Unique delivery identifier.
    pub delivery_id: DeliveryId,
    /// Event being delivered.
    pub event_id: EventId,
    /// Subscription receiving the event.
    pub subscription_id: SubscriptionId,
    /// Number of attempts made so far.
    pub attempt_count: u32,
    /// Current lifecycle state.
    pub status: DeliveryStatus,
    /// Earliest time the next attempt may run.
    pub next_attempt_at: Timestamp,
    /// Most recent failure reason, retained for audit.
    pub last_error: Option<String>,
}

impl WebhookDelivery {
    /// Creates a pending delivery due immediately.
    #[must_use]
    pub const fn pending(
        delivery_id: DeliveryId,
        event_id: EventId,
        subscription_id: SubscriptionId,
        now: Timestamp,
    ) -> Self {
        Self {
            delivery_id,
            event_id,
            subscription_id,
            attempt_count: 0,
            status: DeliveryStatus::Pending,
            next_attempt_at: now,
            last_error: None,
        }
    }
}
