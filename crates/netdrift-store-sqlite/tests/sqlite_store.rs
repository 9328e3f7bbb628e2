// crates/netdrift-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Verifies durable round-trips, restart recovery, and queue
//              ordering for the SQLite backend.
// ============================================================================
//! ## Overview
//! Ensures the SQLite backend matches the reference semantics of the
//! in-memory store and additionally survives a close-and-reopen cycle with
//! intent history, events, and queued deliveries intact.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::path::Path;

use netdrift_core::DeliveryQueue;
use netdrift_core::DeliveryStatus;
use netdrift_core::DeviceId;
use netdrift_core::DriftEvent;
use netdrift_core::DriftEventLog;
use netdrift_core::EventType;
use netdrift_core::IntentScope;
use netdrift_core::IntentStore;
use netdrift_core::ScopeFilter;
use netdrift_core::ScopePath;
use netdrift_core::SnapshotStore;
use netdrift_core::StoreError;
use netdrift_core::SubscriptionRegistry;
use netdrift_core::Timestamp;
use netdrift_core::WebhookDelivery;
use netdrift_core::WebhookSubscription;
use netdrift_core::core::identifiers::DeliveryId;
use netdrift_core::core::identifiers::EventId;
use netdrift_core::core::identifiers::SubscriptionId;
use netdrift_store_sqlite::SqliteStore;
use netdrift_store_sqlite::SqliteStoreConfig;
use serde_json::json;
use tempfile::TempDir;

fn open(path: &Path) -> SqliteStore {
    let config = SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: netdrift_store_sqlite::SqliteJournalMode::Wal,
    };
    SqliteStore::open(&config).expect("open store")
}

fn device(name: &str) -> DeviceId {
    DeviceId::parse(name).expect("device id")
}

fn sample_event(device_id: &DeviceId, scope: &IntentScope) -> DriftEvent {
    DriftEvent {
        event_id: EventId::generate(),
        device_id: device_id.clone(),
        scope: scope.clone(),
        previous_hash: netdrift_core::hashing::hash_bytes(
            netdrift_core::HashAlgorithm::Sha256,
            b"before",
        ),
        current_hash: netdrift_core::hashing::hash_bytes(
            netdrift_core::HashAlgorithm::Sha256,
            b"after",
        ),
        diff: Vec::new(),
        detected_at: Timestamp::from_unix_millis(1_000),
    }
}

fn sample_subscription() -> WebhookSubscription {
    WebhookSubscription {
        subscription_id: SubscriptionId::generate(),
        url: "http://127.0.0.1:9/hook".to_string(),
        secret: "s3cret".to_string(),
        scope_filter: ScopeFilter::Any,
        event_types: vec![EventType::DriftDetected],
        active: true,
    }
}

#[test]
fn intent_versions_survive_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("netdrift.db");
    {
        let store = open(&path);
        store
            .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), None)
            .expect("put v1");
        store
            .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 9000}), Some(1))
            .expect("put v2");
    }
    let store = open(&path);
    let record = store.get_intent(&device("r1"), &IntentScope::Full).expect("get");
    assert_eq!(record.version, 2);
    let history = store.intent_history(&device("r1"), &IntentScope::Full).expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version, 1);
}

#[test]
fn version_conflicts_reject_without_writing() {
    let dir = TempDir::new().expect("tempdir");
    let store = open(&dir.path().join("netdrift.db"));
    store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), None)
        .expect("put v1");
    let err = store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 9000}), Some(5))
        .expect_err("must conflict");
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            expected: 5,
            actual: 1,
            ..
        }
    ));
    let history = store.intent_history(&device("r1"), &IntentScope::Full).expect("history");
    assert_eq!(history.len(), 1);
}

#[test]
fn deletion_deactivates_but_keeps_history() {
    let dir = TempDir::new().expect("tempdir");
    let store = open(&dir.path().join("netdrift.db"));
    let scope = IntentScope::Partial(ScopePath::parse("bgp.neighbors[10.0.0.1]").expect("path"));
    store
        .put_intent(&device("r1"), &scope, &json!({"remote_as": 65001}), None)
        .expect("put");
    store.delete_intent(&device("r1"), &scope).expect("delete");
    assert!(store.get_intent(&device("r1"), &scope).is_err());
    assert!(store.list_intents(&device("r1")).expect("list").is_empty());
    let recreated = store
        .put_intent(&device("r1"), &scope, &json!({"remote_as": 65002}), None)
        .expect("re-put");
    assert_eq!(recreated.version, 2);
}

#[test]
fn snapshots_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("netdrift.db");
    let snapshot = {
        let store = open(&path);
        let tree =
            netdrift_core::CanonicalTree::canonicalize(&json!({"mtu": 1500})).expect("tree");
        let snapshot = netdrift_core::ConfigSnapshot {
            device_id: device("r1"),
            canonical_content: tree.to_canonical_json().expect("text"),
            content_hash: netdrift_core::hashing::hash_tree(&tree).expect("hash"),
            fetched_at: Timestamp::from_unix_millis(5_000),
        };
        store.put_snapshot(&snapshot).expect("put");
        snapshot
    };
    let store = open(&path);
    let loaded = store.get_snapshot(&device("r1")).expect("get").expect("present");
    assert_eq!(loaded, snapshot);
    assert!(store.get_snapshot(&device("r2")).expect("get").is_none());
}

#[test]
fn events_list_newest_first_per_device_and_scope() {
    let dir = TempDir::new().expect("tempdir");
    let store = open(&dir.path().join("netdrift.db"));
    let scope = IntentScope::Full;
    let first = sample_event(&device("r1"), &scope);
    let second = sample_event(&device("r1"), &scope);
    let other = sample_event(&device("r2"), &scope);
    store.append_event(&first).expect("append");
    store.append_event(&second).expect("append");
    store.append_event(&other).expect("append");
    let events = store.events_for_device(&device("r1")).expect("list");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_id, second.event_id);
    assert_eq!(events[1].event_id, first.event_id);
    let scoped = store.events_for_scope(&device("r1"), &scope).expect("list");
    assert_eq!(scoped.len(), 2);
    assert_eq!(store.get_event(&other.event_id).expect("get").expect("present").event_id,
        other.event_id);
}

#[test]
fn subscriptions_deactivate_in_place() {
    let dir = TempDir::new().expect("tempdir");
    let store = open(&dir.path().join("netdrift.db"));
    let subscription = sample_subscription();
    store.insert_subscription(&subscription).expect("insert");
    assert_eq!(store.active_subscriptions().expect("active").len(), 1);
    store
        .deactivate_subscription(&subscription.subscription_id)
        .expect("deactivate");
    assert!(store.active_subscriptions().expect("active").is_empty());
    let stored = store
        .get_subscription(&subscription.subscription_id)
        .expect("get")
        .expect("present");
    assert!(!stored.active);
}

#[test]
fn delivery_queue_is_fifo_per_subscription_and_durable() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("netdrift.db");
    let now = Timestamp::from_unix_millis(10_000);
    let subscription = SubscriptionId::generate();
    let first =
        WebhookDelivery::pending(DeliveryId::generate(), EventId::generate(), subscription, now);
    let second =
        WebhookDelivery::pending(DeliveryId::generate(), EventId::generate(), subscription, now);
    {
        let store = open(&path);
        store.enqueue_delivery(&first).expect("enqueue");
        store.enqueue_delivery(&second).expect("enqueue");
    }
    // Queued deliveries survive restart.
    let store = open(&path);
    let due = store.due_deliveries(now, 10).expect("due");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].delivery_id, first.delivery_id);
    store.mark_succeeded(&first.delivery_id, 1).expect("settle");
    let due = store.due_deliveries(now, 10).expect("due");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].delivery_id, second.delivery_id);
}

#[test]
fn retry_dead_letter_and_replay_update_the_row() {
    let dir = TempDir::new().expect("tempdir");
    let store = open(&dir.path().join("netdrift.db"));
    let now = Timestamp::from_unix_millis(10_000);
    let delivery = WebhookDelivery::pending(
        DeliveryId::generate(),
        EventId::generate(),
        SubscriptionId::generate(),
        now,
    );
    store.enqueue_delivery(&delivery).expect("enqueue");
    let next = Timestamp::from_unix_millis(12_000);
    store
        .mark_retry(&delivery.delivery_id, 1, next, "503 service unavailable")
        .expect("retry");
    assert!(store.due_deliveries(now, 10).expect("due").is_empty());
    store
        .mark_dead_lettered(&delivery.delivery_id, 10, "503 service unavailable")
        .expect("dead-letter");
    assert!(store.due_deliveries(Timestamp::from_unix_millis(i64::MAX), 10).expect("due").is_empty());
    let err = store
        .replay_delivery(&DeliveryId::generate(), now)
        .expect_err("absent delivery");
    assert!(matches!(err, StoreError::DeliveryNotFound { .. }));
    let replayed = store.replay_delivery(&delivery.delivery_id, next).expect("replay");
    assert_eq!(replayed.status, DeliveryStatus::Pending);
    assert_eq!(replayed.attempt_count, 10);
    assert_eq!(store.due_deliveries(next, 10).expect("due").len(), 1);
}
