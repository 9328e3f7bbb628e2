// crates/netdrift-core/tests/canonical.rs
// ============================================================================
// Module: Canonicalization Tests
// Description: Verifies structural normalization and canonical hashing.
// ============================================================================
//! ## Overview
//! Ensures canonicalization is deterministic across key ordering and keyed
//! list ordering, trims string scalars, rejects structurally invalid keyed
//! lists, and produces stable SHA-256 fingerprints.

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

use netdrift_core::CanonicalTree;
use netdrift_core::CanonicalizationError;
use netdrift_core::ScopePath;
use netdrift_core::hashing::hash_tree;
use serde_json::json;

#[test]
fn canonical_json_is_order_independent_for_maps() {
    let a = json!({"mtu": 9000, "hostname": "edge-router-1"});
    let b = json!({"hostname": "edge-router-1", "mtu": 9000});
    let tree_a = CanonicalTree::canonicalize(&a).expect("canonicalize a");
    let tree_b = CanonicalTree::canonicalize(&b).expect("canonicalize b");
    assert_eq!(tree_a, tree_b);
    assert_eq!(
        tree_a.to_canonical_json().expect("serialize"),
        tree_b.to_canonical_json().expect("serialize")
    );
}

#[test]
fn canonical_hash_matches_golden_digest() {
    let value = json!({"hostname": "edge-router-1", "mtu": 9000});
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    assert_eq!(
        tree.to_canonical_json().expect("serialize"),
        r#"{"hostname":"edge-router-1","mtu":9000}"#
    );
    let digest = hash_tree(&tree).expect("hash");
    assert_eq!(
        digest.value,
        "03be1d10dd816d29302899225ab32deeb91bb3b93112dc51505dfd760b6716e2"
    );
    assert_eq!(digest.to_string(), format!("sha256:{}", digest.value));
}

#[test]
fn string_scalars_are_trimmed() {
    let value = json!({"hostname": "  edge-router-1  "});
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    assert_eq!(*tree.as_value(), json!({"hostname": "edge-router-1"}));
}

#[test]
fn keyed_lists_sort_by_identity_value() {
    let value = json!({
        "interfaces": [
            {"name": "eth1", "mtu": 9000},
            {"name": "eth0", "mtu": 1500}
        ]
    });
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    let names: Vec<&str> = tree.as_value()["interfaces"]
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["eth0", "eth1"]);
}

#[test]
fn identity_candidates_apply_in_priority_order() {
    // Both `id` and `name` are present; `id` wins.
    let value = json!({
        "items": [
            {"id": "b", "name": "a"},
            {"id": "a", "name": "b"}
        ]
    });
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    let ids: Vec<&str> = tree.as_value()["items"]
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn unkeyed_lists_keep_their_order() {
    let value = json!({"dns_servers": ["10.9.9.9", "10.1.1.1"]});
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    assert_eq!(*tree.as_value(), json!({"dns_servers": ["10.9.9.9", "10.1.1.1"]}));
}

#[test]
fn partial_identity_presence_is_rejected() {
    let value = json!({
        "interfaces": [
            {"name": "eth0"},
            {"speed": 1000}
        ]
    });
    let err = CanonicalTree::canonicalize(&value).expect_err("must reject");
    assert!(matches!(
        err,
        CanonicalizationError::MissingIdentityKey {
            field: "name",
            index: 1
        }
    ));
}

#[test]
fn duplicate_identity_values_are_rejected() {
    let value = json!({
        "interfaces": [
            {"name": "eth0", "mtu": 1500},
            {"name": "eth0", "mtu": 9000}
        ]
    });
    let err = CanonicalTree::canonicalize(&value).expect_err("must reject");
    assert!(matches!(err, CanonicalizationError::DuplicateIdentityValue { field: "name", .. }));
}

#[test]
fn non_scalar_identity_values_are_rejected() {
    let value = json!({"interfaces": [{"name": {"nested": true}}]});
    let err = CanonicalTree::canonicalize(&value).expect_err("must reject");
    assert!(matches!(
        err,
        CanonicalizationError::NonScalarIdentityValue {
            field: "name",
            index: 0
        }
    ));
}

#[test]
fn non_object_root_is_rejected() {
    let err = CanonicalTree::canonicalize(&json!([1, 2, 3])).expect_err("must reject");
    assert!(matches!(err, CanonicalizationError::RootNotObject));
}

#[test]
fn stored_canonical_text_round_trips() {
    let value = json!({"bgp": {"local_as": 65001}});
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    let text = tree.to_canonical_json().expect("serialize");
    let reloaded = CanonicalTree::from_canonical_json(&text).expect("reload");
    assert_eq!(tree, reloaded);
}

#[test]
fn corrupt_stored_text_is_rejected() {
    let err = CanonicalTree::from_canonical_json("{not json").expect_err("must reject");
    assert!(matches!(err, CanonicalizationError::InvalidStoredContent(_)));
}

#[test]
fn slice_resolves_fields_and_keys() {
    let value = json!({
        "bgp": {
            "neighbors": [
                {"ip": "10.0.0.1", "remote_as": 65001},
                {"ip": "10.0.0.2", "remote_as": 65002}
            ]
        }
    });
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    let path = ScopePath::parse("bgp.neighbors[10.0.0.2]").expect("path");
    let slice = tree.slice(&path).expect("slice");
    assert_eq!(*slice.as_value(), json!({"ip": "10.0.0.2", "remote_as": 65002}));
}

#[test]
fn slice_reports_missing_field() {
    let tree = CanonicalTree::canonicalize(&json!({"bgp": {}})).expect("canonicalize");
    let path = ScopePath::parse("ospf").expect("path");
    let err = tree.slice(&path).expect_err("must fail");
    assert_eq!(err.path, "ospf");
}

#[test]
fn slice_reports_missing_key() {
    let value = json!({"bgp": {"neighbors": [{"ip": "10.0.0.1"}]}});
    let tree = CanonicalTree::canonicalize(&value).expect("canonicalize");
    let path = ScopePath::parse("bgp.neighbors[10.0.0.9]").expect("path");
    assert!(tree.slice(&path).is_err());
}
