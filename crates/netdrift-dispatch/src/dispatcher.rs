// crates/netdrift-dispatch/src/dispatcher.rs
// ============================================================================
// Module: Webhook Dispatcher
// Description: Subscription management, delivery fan-out, and the retry
//              worker pool.
// Purpose: Deliver every matching drift event at least once, then stop.
// Dependencies: netdrift-core, rand, serde, thiserror, tracing, url
// ============================================================================

//! ## Overview
//! The [`Dispatcher`] owns the webhook lifecycle. As a
//! [`DriftNotifier`] it persists one pending delivery per matching active
//! subscription; it never touches the network on that path. A pool of worker
//! threads started by [`Dispatcher::start`] pulls due deliveries (FIFO per
//! subscription, one in flight per subscription), re-checks subscription
//! activity before every attempt, and records success, a backed-off retry,
//! or a dead-letter.
//!
//! Backoff doubles from the configured base up to the cap, with ±50% jitter
//! so a burst of failures does not re-converge into a thundering herd.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use netdrift_core::DeliveryQueue;
use netdrift_core::DriftEvent;
use netdrift_core::DriftEventLog;
use netdrift_core::DriftNotifier;
use netdrift_core::EventType;
use netdrift_core::ScopeFilter;
use netdrift_core::StoreError;
use netdrift_core::SubscriptionRegistry;
use netdrift_core::Timestamp;
use netdrift_core::ValidationError;
use netdrift_core::WebhookDelivery;
use netdrift_core::WebhookSubscription;
use netdrift_core::core::identifiers::DeliveryId;
use netdrift_core::core::identifiers::SubscriptionId;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::payload::WebhookPayload;
use crate::signature::idempotency_key;
use crate::signature::sign_payload;
use crate::sink::DeliveryRequest;
use crate::sink::DeliverySink;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Dispatcher tuning knobs.
///
/// # Invariants
/// - `workers` and `max_attempts` are non-zero (enforced by `validate`).
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Number of blocking delivery worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Attempt budget before a delivery is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay in milliseconds; doubles per attempt.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Idle worker poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Returns the default worker count.
const fn default_workers() -> usize {
    4
}

/// Returns the default attempt budget.
const fn default_max_attempts() -> u32 {
    10
}

/// Returns the default base backoff (1 second).
const fn default_base_backoff_ms() -> u64 {
    1_000
}

/// Returns the default backoff cap (5 minutes).
const fn default_max_backoff_ms() -> u64 {
    300_000
}

/// Returns the default per-request timeout (10 seconds).
const fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Returns the default idle poll interval (200 ms).
const fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DispatchConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for zero workers, a zero attempt budget,
    /// a zero poll interval, or a backoff cap below the base.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::new("dispatch.workers", "must be greater than zero"));
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::new(
                "dispatch.max_attempts",
                "must be greater than zero",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::new(
                "dispatch.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.max_backoff_ms < self.base_backoff_ms {
            return Err(ValidationError::new(
                "dispatch.max_backoff_ms",
                "must be at least base_backoff_ms",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dispatcher operation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A subscription input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A storage operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Shared dispatcher state.
struct Inner {
    /// Tuning knobs.
    config: DispatchConfig,
    /// Subscription storage.
    subscriptions: Arc<dyn SubscriptionRegistry>,
    /// Event storage, read at send time so replays see persisted content.
    events: Arc<dyn DriftEventLog>,
    /// Durable delivery queue.
    queue: Arc<dyn DeliveryQueue>,
    /// Network boundary.
    sink: Arc<dyn DeliverySink>,
    /// Subscriptions with an attempt currently in flight.
    in_flight: Mutex<HashSet<String>>,
}

/// Webhook subscription manager and delivery engine.
#[derive(Clone)]
pub struct Dispatcher {
    /// Shared state, cloned into worker threads.
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given storage seams and sink.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] when the configuration is
    /// invalid.
    pub fn new(
        config: DispatchConfig,
        subscriptions: Arc<dyn SubscriptionRegistry>,
        events: Arc<dyn DriftEventLog>,
        queue: Arc<dyn DeliveryQueue>,
        sink: Arc<dyn DeliverySink>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                subscriptions,
                events,
                queue,
                sink,
                in_flight: Mutex::new(HashSet::new()),
            }),
        })
    }

    /// Registers a webhook endpoint.
    ///
    /// An empty `event_types` list subscribes to every event type.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] for a non-http(s) URL or an
    /// empty secret, and storage errors otherwise.
    pub fn subscribe(
        &self,
        url: &str,
        secret: &str,
        scope_filter: ScopeFilter,
        event_types: Vec<EventType>,
    ) -> Result<WebhookSubscription, DispatchError> {
        let parsed = Url::parse(url)
            .map_err(|err| ValidationError::new("url", err.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ValidationError::new("url", "scheme must be http or https").into());
        }
        if secret.is_empty() {
            return Err(ValidationError::new("secret", "must not be empty").into());
        }
        let event_types = if event_types.is_empty() {
            vec![EventType::DriftDetected]
        } else {
            event_types
        };
        let subscription = WebhookSubscription {
            subscription_id: SubscriptionId::generate(),
            url: parsed.to_string(),
            secret: secret.to_string(),
            scope_filter,
            event_types,
            active: true,
        };
        self.inner.subscriptions.insert_subscription(&subscription)?;
        info!(subscription = %subscription.subscription_id, url = %subscription.url, "subscribed");
        Ok(subscription)
    }

    /// Deactivates a subscription.
    ///
    /// Takes effect immediately: workers re-check activity before every
    /// attempt, so pending deliveries for this subscription dead-letter
    /// instead of reaching the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SubscriptionNotFound`] when absent.
    pub fn unsubscribe(&self, subscription_id: &SubscriptionId) -> Result<(), DispatchError> {
        self.inner.subscriptions.deactivate_subscription(subscription_id)?;
        info!(subscription = %subscription_id, "unsubscribed");
        Ok(())
    }

    /// Manually replays a dead-lettered delivery.
    ///
    /// # Errors
    ///
    /// Returns storage errors, including [`StoreError::NotReplayable`] for
    /// deliveries that are not dead-lettered.
    pub fn replay(&self, delivery_id: &DeliveryId) -> Result<WebhookDelivery, DispatchError> {
        let delivery = self.inner.queue.replay_delivery(delivery_id, Timestamp::now())?;
        info!(delivery = %delivery_id, "delivery replayed");
        Ok(delivery)
    }

    /// Starts the worker pool.
    #[must_use]
    pub fn start(&self) -> DispatcherHandle {
        let running = Arc::new(AtomicBool::new(true));
        let mut workers = Vec::with_capacity(self.inner.config.workers);
        for index in 0 .. self.inner.config.workers {
            let dispatcher = self.clone();
            let running = Arc::clone(&running);
            let spawned = thread::Builder::new()
                .name(format!("netdrift-delivery-{index}"))
                .spawn(move || dispatcher.worker_loop(&running));
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    error!(error = %err, index, "failed to spawn delivery worker");
                }
            }
        }
        DispatcherHandle {
            running,
            workers,
        }
    }

    /// Polls and processes deliveries until shutdown.
    fn worker_loop(&self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            if !self.process_one() {
                thread::sleep(Duration::from_millis(self.inner.config.poll_interval_ms));
            }
        }
    }

    /// Claims and attempts one due delivery. Returns false when idle.
    fn process_one(&self) -> bool {
        let now = Timestamp::now();
        let batch = self.inner.config.workers.saturating_mul(2).max(2);
        let due = match self.inner.queue.due_deliveries(now, batch) {
            Ok(due) => due,
            Err(err) => {
                error!(error = %err, "failed to poll the delivery queue");
                return false;
            }
        };
        let Some(delivery) = self.claim(&due) else {
            return false;
        };
        self.attempt(&delivery, now);
        self.release(&delivery);
        true
    }

    /// Claims the first due delivery whose subscription is not in flight.
    fn claim(&self, due: &[WebhookDelivery]) -> Option<WebhookDelivery> {
        let Ok(mut in_flight) = self.inner.in_flight.lock() else {
            return None;
        };
        for delivery in due {
            if in_flight.insert(delivery.subscription_id.to_string()) {
                return Some(delivery.clone());
            }
        }
        None
    }

    /// Releases the claimed subscription.
    fn release(&self, delivery: &WebhookDelivery) {
        if let Ok(mut in_flight) = self.inner.in_flight.lock() {
            in_flight.remove(&delivery.subscription_id.to_string());
        }
    }

    /// Performs one delivery attempt and records its outcome.
    fn attempt(&self, delivery: &WebhookDelivery, now: Timestamp) {
        if let Err(err) = self.attempt_inner(delivery, now) {
            // Storage failed while recording the outcome; the delivery stays
            // due and a later poll retries it.
            error!(delivery = %delivery.delivery_id, error = %err, "delivery bookkeeping failed");
        }
    }

    /// Attempt body; every exit records an outcome on the queue.
    fn attempt_inner(
        &self,
        delivery: &WebhookDelivery,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let subscription = self.inner.subscriptions.get_subscription(&delivery.subscription_id)?;
        let Some(subscription) = subscription.filter(|subscription| subscription.active) else {
            warn!(
                delivery = %delivery.delivery_id,
                subscription = %delivery.subscription_id,
                "subscription inactive; dead-lettering delivery"
            );
            return self.inner.queue.mark_dead_lettered(
                &delivery.delivery_id,
                delivery.attempt_count,
                "subscription inactive",
            );
        };
        let Some(event) = self.inner.events.get_event(&delivery.event_id)? else {
            error!(
                delivery = %delivery.delivery_id,
                event = %delivery.event_id,
                "event record missing; dead-lettering delivery"
            );
            return self.inner.queue.mark_dead_lettered(
                &delivery.delivery_id,
                delivery.attempt_count,
                "event record missing",
            );
        };
        let body = match WebhookPayload::from_event(&event).to_bytes() {
            Ok(body) => body,
            Err(err) => {
                return self.inner.queue.mark_dead_lettered(
                    &delivery.delivery_id,
                    delivery.attempt_count,
                    &format!("payload serialization failed: {err}"),
                );
            }
        };
        let request = DeliveryRequest {
            url: subscription.url.clone(),
            signature: sign_payload(&subscription.secret, &body),
            idempotency_key: idempotency_key(&delivery.event_id, &delivery.subscription_id),
            body,
        };
        let attempts = delivery.attempt_count.saturating_add(1);
        match self.inner.sink.deliver(&request) {
            Ok(()) => {
                debug!(
                    delivery = %delivery.delivery_id,
                    subscription = %subscription.subscription_id,
                    attempts,
                    "delivery succeeded"
                );
                self.inner.queue.mark_succeeded(&delivery.delivery_id, attempts)
            }
            Err(err) if attempts >= self.inner.config.max_attempts => {
                warn!(
                    delivery = %delivery.delivery_id,
                    subscription = %subscription.subscription_id,
                    attempts,
                    error = %err,
                    "attempt budget exhausted; dead-lettering delivery"
                );
                self.inner.queue.mark_dead_lettered(
                    &delivery.delivery_id,
                    attempts,
                    &err.to_string(),
                )
            }
            Err(err) => {
                let next_attempt_at = now.saturating_add_millis(self.backoff_millis(attempts));
                debug!(
                    delivery = %delivery.delivery_id,
                    subscription = %subscription.subscription_id,
                    attempts,
                    error = %err,
                    "attempt failed; retry scheduled"
                );
                self.inner.queue.mark_retry(
                    &delivery.delivery_id,
                    attempts,
                    next_attempt_at,
                    &err.to_string(),
                )
            }
        }
    }

    /// Computes the jittered backoff after `attempts` failed attempts.
    ///
    /// Doubles from the base per attempt, caps at the configured maximum,
    /// then spreads the result uniformly over ±50%.
    fn backoff_millis(&self, attempts: u32) -> i64 {
        let exponent = attempts.saturating_sub(1).min(63);
        let delay = self
            .inner
            .config
            .base_backoff_ms
            .saturating_mul(1_u64.checked_shl(exponent).unwrap_or(u64::MAX))
            .min(self.inner.config.max_backoff_ms);
        let jittered = (delay / 2).saturating_add(rand::thread_rng().gen_range(0 ..= delay));
        i64::try_from(jittered).unwrap_or(i64::MAX)
    }
}

impl DriftNotifier for Dispatcher {
    fn notify(&self, event: &DriftEvent) -> Result<(), StoreError> {
        let now = Timestamp::now();
        let mut enqueued = 0_usize;
        for subscription in self.inner.subscriptions.active_subscriptions()? {
            if !subscription.wants(&event.scope, event.event_type()) {
                continue;
            }
            let delivery = WebhookDelivery::pending(
                DeliveryId::generate(),
                event.event_id,
                subscription.subscription_id,
                now,
            );
            self.inner.queue.enqueue_delivery(&delivery)?;
            enqueued += 1;
        }
        debug!(event = %event.event_id, deliveries = enqueued, "drift event fanned out");
        Ok(())
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Handle over a running worker pool.
pub struct DispatcherHandle {
    /// Shutdown flag observed by every worker.
    running: Arc<AtomicBool>,
    /// Worker thread handles.
    workers: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Stops the workers and waits for in-flight attempts to settle.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("delivery worker panicked during shutdown");
            }
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
