// crates/netdrift-core/tests/detector.rs
// ============================================================================
// Module: Drift Detector Tests
// Description: Verifies drift detection against stored intent.
// ============================================================================
//! ## Overview
//! Ensures matching snapshots produce no events, mismatches produce exactly
//! one explained event per drifted scope, missing scopes report as
//! whole-scope removals, and detections across scopes stay independent.

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

use std::sync::Arc;

use netdrift_core::DeviceId;
use netdrift_core::DiffOp;
use netdrift_core::DriftDetector;
use netdrift_core::DriftEventLog;
use netdrift_core::IntentScope;
use netdrift_core::IntentStore;
use netdrift_core::MemoryStore;
use netdrift_core::NullNotifier;
use netdrift_core::ScopePath;
use netdrift_core::SnapshotStore;
use serde_json::json;

fn detector(store: &Arc<MemoryStore>) -> DriftDetector {
    DriftDetector::new(
        Arc::clone(store) as Arc<dyn IntentStore>,
        Arc::clone(store) as Arc<dyn SnapshotStore>,
        Arc::clone(store) as Arc<dyn DriftEventLog>,
        Arc::new(NullNotifier),
    )
}

fn device(name: &str) -> DeviceId {
    DeviceId::parse(name).expect("device id")
}

fn partial(path: &str) -> IntentScope {
    IntentScope::Partial(ScopePath::parse(path).expect("scope path"))
}

#[test]
fn equivalent_snapshot_produces_no_events() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_intent(
            &device("r1"),
            &IntentScope::Full,
            &json!({"bgp": {"neighbors": [{"ip": "10.0.0.1", "remote_as": 65001}]}}),
            None,
        )
        .expect("put intent");
    // Same content, keys reordered.
    let outcome = detector(&store)
        .process_snapshot(
            &device("r1"),
            &json!({"bgp": {"neighbors": [{"remote_as": 65001, "ip": "10.0.0.1"}]}}),
        )
        .expect("process");
    assert!(outcome.events.is_empty());
    assert!(outcome.extraction_failures.is_empty());
    assert!(outcome.invariant_violations.is_empty());
    // The snapshot is persisted either way.
    assert!(store.get_snapshot(&device("r1")).expect("get").is_some());
}

#[test]
fn changed_neighbor_produces_one_explained_event() {
    let store = Arc::new(MemoryStore::new());
    let intent = store
        .put_intent(
            &device("r1"),
            &IntentScope::Full,
            &json!({"bgp": {"neighbors": [{"ip": "10.0.0.1", "remote_as": 65001}]}}),
            None,
        )
        .expect("put intent");
    let outcome = detector(&store)
        .process_snapshot(
            &device("r1"),
            &json!({"bgp": {"neighbors": [{"ip": "10.0.0.1", "remote_as": 65002}]}}),
        )
        .expect("process");
    assert_eq!(outcome.events.len(), 1);
    let event = &outcome.events[0];
    assert_eq!(event.previous_hash, intent.content_hash);
    assert_ne!(event.current_hash, intent.content_hash);
    assert_eq!(event.diff.len(), 1);
    assert_eq!(event.diff[0].op, DiffOp::Changed);
    assert_eq!(event.diff[0].path.to_string(), "bgp.neighbors[10.0.0.1].remote_as");
    assert_eq!(event.diff[0].old_value, Some(json!(65001)));
    assert_eq!(event.diff[0].new_value, Some(json!(65002)));
    // The event is persisted in the log.
    let logged = store.events_for_device(&device("r1")).expect("log");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].event_id, event.event_id);
}

#[test]
fn partial_scopes_drift_independently() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_intent(
            &device("r1"),
            &partial("bgp.neighbors[10.0.0.1]"),
            &json!({"ip": "10.0.0.1", "remote_as": 65001}),
            None,
        )
        .expect("put neighbor 1");
    store
        .put_intent(
            &device("r1"),
            &partial("bgp.neighbors[10.0.0.2]"),
            &json!({"ip": "10.0.0.2", "remote_as": 65002}),
            None,
        )
        .expect("put neighbor 2");
    // Only neighbor .2 drifts.
    let outcome = detector(&store)
        .process_snapshot(
            &device("r1"),
            &json!({
                "bgp": {
                    "neighbors": [
                        {"ip": "10.0.0.1", "remote_as": 65001},
                        {"ip": "10.0.0.2", "remote_as": 65099}
                    ]
                }
            }),
        )
        .expect("process");
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].scope, partial("bgp.neighbors[10.0.0.2]"));
    let for_one = store
        .events_for_scope(&device("r1"), &partial("bgp.neighbors[10.0.0.1]"))
        .expect("scope log");
    assert!(for_one.is_empty());
}

#[test]
fn missing_scope_reports_a_whole_scope_removal() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_intent(
            &device("r1"),
            &partial("bgp.neighbors[10.0.0.1]"),
            &json!({"ip": "10.0.0.1", "remote_as": 65001}),
            None,
        )
        .expect("put intent");
    // The snapshot has no bgp section at all.
    let outcome = detector(&store)
        .process_snapshot(&device("r1"), &json!({"hostname": "r1"}))
        .expect("process");
    assert_eq!(outcome.extraction_failures.len(), 1);
    assert_eq!(outcome.events.len(), 1);
    let event = &outcome.events[0];
    assert_eq!(event.diff.len(), 1);
    assert_eq!(event.diff[0].op, DiffOp::Removed);
    assert_eq!(event.diff[0].path.to_string(), "");
    assert_eq!(event.diff[0].old_value, Some(json!({"ip": "10.0.0.1", "remote_as": 65001})));
}

#[test]
fn repeated_drift_appends_to_the_event_log() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), None)
        .expect("put intent");
    let detector = detector(&store);
    for mtu in [9000, 9100] {
        let outcome = detector
            .process_snapshot(&device("r1"), &json!({"mtu": mtu}))
            .expect("process");
        assert_eq!(outcome.events.len(), 1);
    }
    // The log is append-only; re-detection never rewrites earlier events.
    let logged = store.events_for_device(&device("r1")).expect("log");
    assert_eq!(logged.len(), 2);
    // Newest first.
    assert_eq!(logged[0].diff[0].new_value, Some(json!(9100)));
    assert_eq!(logged[1].diff[0].new_value, Some(json!(9000)));
}

#[test]
fn devices_without_intent_produce_no_events() {
    let store = Arc::new(MemoryStore::new());
    let outcome = detector(&store)
        .process_snapshot(&device("r9"), &json!({"hostname": "r9"}))
        .expect("process");
    assert!(outcome.events.is_empty());
    assert!(store.get_snapshot(&device("r9")).expect("get").is_some());
}
