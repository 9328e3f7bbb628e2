// crates/netdrift-core/src/store/memory.rs
// ============================================================================
// Module: Netdrift In-Memory Store Implementation
// Description: Process-local implementation of all five storage interfaces.
// Purpose: Reference semantics for tests and embedded use.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Intents live in a map of per-`(device, scope)` slots; each slot carries
//! the full append-only version history and is guarded by its own mutex, so
//! writes to one pair are linearized while distinct pairs proceed in
//! parallel. Snapshots, events, subscriptions, and deliveries use plain
//! read-write locks; the delivery vector's insertion order is the queue's
//! FIFO order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use serde_json::Value;

use crate::canonical::CanonicalTree;
use crate::core::drift::DriftEvent;
use crate::core::identifiers::DeliveryId;
use crate::core::identifiers::DeviceId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::SubscriptionId;
use crate::core::intent::ConfigSnapshot;
use crate::core::intent::IntentRecord;
use crate::core::scope::IntentScope;
use crate::core::time::Timestamp;
use crate::core::webhook::DeliveryStatus;
use crate::core::webhook::WebhookDelivery;
use crate::core::webhook::WebhookSubscription;
use crate::hashing::hash_tree;
use crate::interfaces::DeliveryQueue;
use crate::interfaces::DriftEventLog;
use crate::interfaces::IntentStore;
use crate::interfaces::SnapshotStore;
use crate::interfaces::StoreError;
use crate::interfaces::SubscriptionRegistry;

// ============================================================================
// SECTION: Store State
// ============================================================================

/// Version history for one `(device, scope)` pair.
#[derive(Debug, Default)]
struct IntentSlot {
    /// Every version ever written, oldest first.
    history: Vec<IntentRecord>,
    /// Whether the latest version is active (not deleted).
    active: bool,
}

/// Map key for intent slots: `(device, scope storage key)`.
type SlotKey = (String, String);

/// In-memory implementation of every storage interface.
///
/// # Invariants
/// - Slot mutexes linearize writes per `(device, scope)` pair.
/// - Event and delivery collections are append-only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Intent slots, ordered by key for deterministic listings.
    intents: RwLock<BTreeMap<SlotKey, Arc<Mutex<IntentSlot>>>>,
    /// Latest snapshot per device.
    snapshots: RwLock<BTreeMap<String, ConfigSnapshot>>,
    /// Drift events in detection order.
    events: RwLock<Vec<DriftEvent>>,
    /// Subscriptions by identifier.
    subscriptions: RwLock<BTreeMap<String, WebhookSubscription>>,
    /// Deliveries in enqueue order.
    deliveries: RwLock<Vec<WebhookDelivery>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches or creates the slot for a `(device, scope)` pair.
    fn slot(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
        create: bool,
    ) -> Result<Option<Arc<Mutex<IntentSlot>>>, StoreError> {
        let key = (device_id.to_string(), scope.storage_key());
        {
            let map = read_lock(&self.intents)?;
            if let Some(slot) = map.get(&key) {
                return Ok(Some(Arc::clone(slot)));
            }
        }
        if !create {
            return Ok(None);
        }
        let mut map = write_lock(&self.intents)?;
        let slot = map.entry(key).or_default();
        Ok(Some(Arc::clone(slot)))
    }
}

/// Acquires a read lock, surfacing poisoning as a storage failure.
fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| poisoned())
}

/// Acquires a write lock, surfacing poisoning as a storage failure.
fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| poisoned())
}

/// Acquires a slot mutex, surfacing poisoning as a storage failure.
fn slot_lock(slot: &Mutex<IntentSlot>) -> Result<MutexGuard<'_, IntentSlot>, StoreError> {
    slot.lock().map_err(|_| poisoned())
}

/// Storage error for a poisoned lock (a prior writer panicked).
fn poisoned() -> StoreError {
    StoreError::Io("in-memory store lock poisoned".to_string())
}

/// Not-found error for a `(device, scope)` pair.
fn intent_not_found(device_id: &DeviceId, scope: &IntentScope) -> StoreError {
    StoreError::IntentNotFound {
        device_id: device_id.to_string(),
        scope: scope.storage_key(),
    }
}

// ============================================================================
// SECTION: Intent Store
// ============================================================================

impl IntentStore for MemoryStore {
    fn put_intent(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
        raw_content: &Value,
        expected_version: Option<u64>,
    ) -> Result<IntentRecord, StoreError> {
        let tree = CanonicalTree::canonicalize(raw_content)?;
        let canonical_content = tree.to_canonical_json()?;
        let content_hash = hash_tree(&tree)?;
        let slot = self
            .slot(device_id, scope, true)?
            .ok_or_else(|| intent_not_found(device_id, scope))?;
        let mut guard = slot_lock(&slot)?;
        let actual = if guard.active {
            guard.history.last().map_or(0, |record| record.version)
        } else {
            0
        };
        if let Some(expected) = expected_version
            && expected != actual
        {
            return Err(StoreError::VersionConflict {
                device_id: device_id.to_string(),
                scope: scope.storage_key(),
                expected,
                actual,
            });
        }
        let now = Timestamp::now();
        let version = guard.history.last().map_or(0, |record| record.version) + 1;
        let created_at = if guard.active {
            guard.history.last().map_or(now, |record| record.created_at)
        } else {
            now
        };
        let record = IntentRecord {
            device_id: device_id.clone(),
            scope: scope.clone(),
            canonical_content,
            content_hash,
            version,
            created_at,
            updated_at: now,
        };
        guard.history.push(record.clone());
        guard.active = true;
        Ok(record)
    }

    fn get_intent(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<IntentRecord, StoreError> {
        let slot = self
            .slot(device_id, scope, false)?
            .ok_or_else(|| intent_not_found(device_id, scope))?;
        let guard = slot_lock(&slot)?;
        if !guard.active {
            return Err(intent_not_found(device_id, scope));
        }
        guard
            .history
            .last()
            .cloned()
            .ok_or_else(|| intent_not_found(device_id, scope))
    }

    fn list_intents(&self, device_id: &DeviceId) -> Result<Vec<IntentRecord>, StoreError> {
        let device = device_id.to_string();
        let slots: Vec<Arc<Mutex<IntentSlot>>> = {
            let map = read_lock(&self.intents)?;
            map.iter()
                .filter(|((slot_device, _), _)| *slot_device == device)
                .map(|(_, slot)| Arc::clone(slot))
                .collect()
        };
        let mut records = Vec::new();
        for slot in slots {
            let guard = slot_lock(&slot)?;
            if guard.active
                && let Some(record) = guard.history.last()
            {
                records.push(record.clone());
            }
        }
        Ok(records)
    }

    fn delete_intent(&self, device_id: &DeviceId, scope: &IntentScope) -> Result<(), StoreError> {
        let slot = self
            .slot(device_id, scope, false)?
            .ok_or_else(|| intent_not_found(device_id, scope))?;
        let mut guard = slot_lock(&slot)?;
        if !guard.active {
            return Err(intent_not_found(device_id, scope));
        }
        guard.active = false;
        Ok(())
    }

    fn intent_history(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<Vec<IntentRecord>, StoreError> {
        let slot = self
            .slot(device_id, scope, false)?
            .ok_or_else(|| intent_not_found(device_id, scope))?;
        let guard = slot_lock(&slot)?;
        if guard.history.is_empty() {
            return Err(intent_not_found(device_id, scope));
        }
        Ok(guard.history.clone())
    }

    fn readiness(&self) -> Result<(), StoreError> {
        read_lock(&self.intents).map(|_| ())
    }
}

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

impl SnapshotStore for MemoryStore {
    fn put_snapshot(&self, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
        let mut map = write_lock(&self.snapshots)?;
        map.insert(snapshot.device_id.to_string(), snapshot.clone());
        Ok(())
    }

    fn get_snapshot(&self, device_id: &DeviceId) -> Result<Option<ConfigSnapshot>, StoreError> {
        let map = read_lock(&self.snapshots)?;
        Ok(map.get(&device_id.to_string()).cloned())
    }
}

// ============================================================================
// SECTION: Drift Event Log
// ============================================================================

impl DriftEventLog for MemoryStore {
    fn append_event(&self, event: &DriftEvent) -> Result<(), StoreError> {
        let mut events = write_lock(&self.events)?;
        events.push(event.clone());
        Ok(())
    }

    fn get_event(&self, event_id: &EventId) -> Result<Option<DriftEvent>, StoreError> {
        let events = read_lock(&self.events)?;
        Ok(events.iter().find(|event| event.event_id == *event_id).cloned())
    }

    fn events_for_device(&self, device_id: &DeviceId) -> Result<Vec<DriftEvent>, StoreError> {
        let events = read_lock(&self.events)?;
        Ok(events
            .iter()
            .rev()
            .filter(|event| event.device_id == *device_id)
            .cloned()
            .collect())
    }

    fn events_for_scope(
        &self,
        device_id: &DeviceId,
        scope: &IntentScope,
    ) -> Result<Vec<DriftEvent>, StoreError> {
        let events = read_lock(&self.events)?;
        Ok(events
            .iter()
            .rev()
            .filter(|event| event.device_id == *device_id && event.scope == *scope)
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Subscription Registry
// ============================================================================

impl SubscriptionRegistry for MemoryStore {
    fn insert_subscription(&self, subscription: &WebhookSubscription) -> Result<(), StoreError> {
        let mut map = write_lock(&self.subscriptions)?;
        map.insert(subscription.subscription_id.to_string(), subscription.clone());
        Ok(())
    }

    fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<WebhookSubscription>, StoreError> {
        let map = read_lock(&self.subscriptions)?;
        Ok(map.get(&subscription_id.to_string()).cloned())
    }

    fn active_subscriptions(&self) -> Result<Vec<WebhookSubscription>, StoreError> {
        let map = read_lock(&self.subscriptions)?;
        Ok(map.values().filter(|sub| sub.active).cloned().collect())
    }

    fn deactivate_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<(), StoreError> {
        let mut map = write_lock(&self.subscriptions)?;
        let Some(subscription) = map.get_mut(&subscription_id.to_string()) else {
            return Err(StoreError::SubscriptionNotFound {
                subscription_id: subscription_id.to_string(),
            });
        };
        subscription.active = false;
        Ok(())
    }
}

// ============================================================================
// SECTION: Delivery Queue
// ============================================================================

/// Not-found error for a delivery identifier.
fn delivery_not_found(delivery_id: &DeliveryId) -> StoreError {
    StoreError::DeliveryNotFound {
        delivery_id: delivery_id.to_string(),
    }
}

impl DeliveryQueue for MemoryStore {
    fn enqueue_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        let mut deliveries = write_lock(&self.deliveries)?;
        deliveries.push(delivery.clone());
        Ok(())
    }

    fn due_deliveries(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let deliveries = read_lock(&self.deliveries)?;
        let mut seen_subscriptions = BTreeSet::new();
        let mut due = Vec::new();
        for delivery in deliveries.iter() {
            if due.len() >= limit {
                break;
            }
            if matches!(delivery.status, DeliveryStatus::Succeeded | DeliveryStatus::DeadLettered)
            {
                continue;
            }
            // Only the subscription's earliest unsettled delivery is a
            // candidate; a not-yet-due head blocks the subscription (FIFO).
            if !seen_subscriptions.insert(delivery.subscription_id.to_string()) {
                continue;
            }
            if delivery.next_attempt_at <= now {
                due.push(delivery.clone());
            }
        }
        Ok(due)
    }

    fn get_delivery(
        &self,
        delivery_id: &DeliveryId,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        let deliveries = read_lock(&self.deliveries)?;
        Ok(deliveries
            .iter()
            .find(|delivery| delivery.delivery_id == *delivery_id)
            .cloned())
    }

    fn mark_succeeded(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
    ) -> Result<(), StoreError> {
        let mut deliveries = write_lock(&self.deliveries)?;
        let delivery = deliveries
            .iter_mut()
            .find(|delivery| delivery.delivery_id == *delivery_id)
            .ok_or_else(|| delivery_not_found(delivery_id))?;
        delivery.status = DeliveryStatus::Succeeded;
        delivery.attempt_count = attempt_count;
        delivery.last_error = None;
        Ok(())
    }

    fn mark_retry(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
        next_attempt_at: Timestamp,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut deliveries = write_lock(&self.deliveries)?;
        let delivery = deliveries
            .iter_mut()
            .find(|delivery| delivery.delivery_id == *delivery_id)
            .ok_or_else(|| delivery_not_found(delivery_id))?;
        delivery.status = DeliveryStatus::Failed;
        delivery.attempt_count = attempt_count;
        delivery.next_attempt_at = next_attempt_at;
        delivery.last_error = Some(error.to_string());
        Ok(())
    }

    fn mark_dead_lettered(
        &self,
        delivery_id: &DeliveryId,
        attempt_count: u32,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut deliveries = write_lock(&self.deliveries)?;
        let delivery = deliveries
            .iter_mut()
            .find(|delivery| delivery.delivery_id == *delivery_id)
            .ok_or_else(|| delivery_not_found(delivery_id))?;
        delivery.status = DeliveryStatus::DeadLettered;
        delivery.attempt_count = attempt_count;
        delivery.last_error = Some(error.to_string());
        Ok(())
    }

    fn replay_delivery(
        &self,
        delivery_id: &DeliveryId,
        now: Timestamp,
    ) -> Result<WebhookDelivery, StoreError> {
        let mut deliveries = write_lock(&self.deliveries)?;
        let delivery = deliveries
            .iter_mut()
            .find(|delivery| delivery.delivery_id == *delivery_id)
            .ok_or_else(|| delivery_not_found(delivery_id))?;
        if delivery.status != DeliveryStatus::DeadLettered {
            return Err(StoreError::NotReplayable {
                delivery_id: delivery_id.to_string(),
                status: delivery.status,
            });
        }
        delivery.status = DeliveryStatus::Pending;
        delivery.next_attempt_at = now;
        Ok(delivery.clone())
    }
}
