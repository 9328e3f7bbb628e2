// crates/netdrift-core/tests/intent_store.rs
// ============================================================================
// Module: In-Memory Intent Store Tests
// Description: Verifies versioning, optimistic concurrency, and scope
//              isolation of the reference store.
// ============================================================================
//! ## Overview
//! Ensures writes version monotonically, version conflicts leave the store
//! untouched, deletion retains history, and scopes of one device never
//! interfere with each other.

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

use netdrift_core::DeviceId;
use netdrift_core::IntentScope;
use netdrift_core::IntentStore;
use netdrift_core::MemoryStore;
use netdrift_core::ScopePath;
use netdrift_core::StoreError;
use serde_json::json;

fn device(name: &str) -> DeviceId {
    DeviceId::parse(name).expect("device id")
}

fn partial(path: &str) -> IntentScope {
    IntentScope::Partial(ScopePath::parse(path).expect("scope path"))
}

#[test]
fn first_write_starts_at_version_one() {
    let store = MemoryStore::new();
    let record = store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), None)
        .expect("put");
    assert_eq!(record.version, 1);
    assert_eq!(record.created_at, record.updated_at);
}

#[test]
fn updates_increment_the_version_and_keep_created_at() {
    let store = MemoryStore::new();
    let first = store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), None)
        .expect("put v1");
    let second = store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 9000}), Some(1))
        .expect("put v2");
    assert_eq!(second.version, 2);
    assert_eq!(second.created_at, first.created_at);
    assert_ne!(second.content_hash, first.content_hash);
}

#[test]
fn version_conflicts_reject_the_write() {
    let store = MemoryStore::new();
    store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), None)
        .expect("put v1");
    let err = store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 9000}), Some(7))
        .expect_err("must conflict");
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            expected: 7,
            actual: 1,
            ..
        }
    ));
    // No write occurred.
    let current = store.get_intent(&device("r1"), &IntentScope::Full).expect("get");
    assert_eq!(current.version, 1);
    assert!(current.canonical_content.contains("1500"));
}

#[test]
fn expected_version_on_a_fresh_scope_conflicts() {
    let store = MemoryStore::new();
    let err = store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), Some(1))
        .expect_err("must conflict");
    assert!(matches!(err, StoreError::VersionConflict { actual: 0, .. }));
}

#[test]
fn deletion_retains_history_and_version_sequence() {
    let store = MemoryStore::new();
    let scope = partial("bgp.neighbors[10.0.0.1]");
    store
        .put_intent(&device("r1"), &scope, &json!({"remote_as": 65001}), None)
        .expect("put v1");
    store.delete_intent(&device("r1"), &scope).expect("delete");
    assert!(matches!(
        store.get_intent(&device("r1"), &scope),
        Err(StoreError::IntentNotFound { .. })
    ));
    // History survives deletion and the version sequence continues.
    let history = store.intent_history(&device("r1"), &scope).expect("history");
    assert_eq!(history.len(), 1);
    let recreated = store
        .put_intent(&device("r1"), &scope, &json!({"remote_as": 65002}), None)
        .expect("re-put");
    assert_eq!(recreated.version, 2);
    let history = store.intent_history(&device("r1"), &scope).expect("history");
    assert_eq!(history.len(), 2);
    assert!(history[0].version < history[1].version);
}

#[test]
fn deleting_an_absent_scope_is_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(
        store.delete_intent(&device("r1"), &IntentScope::Full),
        Err(StoreError::IntentNotFound { .. })
    ));
}

#[test]
fn scopes_of_one_device_are_isolated() {
    let store = MemoryStore::new();
    let scope_a = partial("bgp.neighbors[10.0.0.1]");
    let scope_b = partial("bgp.neighbors[10.0.0.2]");
    let initial_b = store
        .put_intent(&device("r1"), &scope_b, &json!({"remote_as": 65002}), None)
        .expect("put b");
    for mtu in [1, 2, 3] {
        store
            .put_intent(&device("r1"), &scope_a, &json!({"remote_as": mtu}), None)
            .expect("put a");
    }
    let after_b = store.get_intent(&device("r1"), &scope_b).expect("get b");
    assert_eq!(after_b.version, initial_b.version);
    assert_eq!(after_b.content_hash, initial_b.content_hash);
    let after_a = store.get_intent(&device("r1"), &scope_a).expect("get a");
    assert_eq!(after_a.version, 3);
}

#[test]
fn listing_returns_only_active_intents() {
    let store = MemoryStore::new();
    let scope_a = partial("bgp.neighbors[10.0.0.1]");
    store
        .put_intent(&device("r1"), &IntentScope::Full, &json!({"mtu": 1500}), None)
        .expect("put full");
    store
        .put_intent(&device("r1"), &scope_a, &json!({"remote_as": 65001}), None)
        .expect("put partial");
    store
        .put_intent(&device("r2"), &IntentScope::Full, &json!({"mtu": 9000}), None)
        .expect("put other device");
    assert_eq!(store.list_intents(&device("r1")).expect("list").len(), 2);
    store.delete_intent(&device("r1"), &scope_a).expect("delete");
    let remaining = store.list_intents(&device("r1")).expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].scope, IntentScope::Full);
}

#[test]
fn malformed_payloads_never_write() {
    let store = MemoryStore::new();
    let err = store
        .put_intent(&device("r1"), &IntentScope::Full, &json!(["not", "an", "object"]), None)
        .expect_err("must reject");
    assert!(matches!(err, StoreError::Canonicalization(_)));
    assert!(store.list_intents(&device("r1")).expect("list").is_empty());
}

#[test]
fn readiness_probe_succeeds() {
    let store = MemoryStore::new();
    store.readiness().expect("ready");
}
