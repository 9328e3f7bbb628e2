// crates/netdrift-core/src/diff/engine.rs
// ============================================================================
// Module: Netdrift Diff Computation
// Description: Recursive walk producing structural deltas between trees.
// Purpose: Compute minimal, deterministic edit sequences for drift events.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`diff_trees`] walks two canonical trees in parallel. Maps match children
//! by field; keyed lists match elements by identity value; unkeyed sequences
//! use a longest-common-subsequence edit so one inserted element reports as a
//! single addition. Entries come out in a deterministic order: sorted field
//! and key order for maps and keyed lists, positional order for sequences.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::canonical::CanonicalTree;
use crate::canonical::identity_key_of;
use crate::canonical::render_identity;
use crate::diff::model::DiffEntry;
use crate::diff::model::DiffError;
use crate::diff::model::DiffPath;
use crate::diff::model::DiffSegment;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Computes the structural diff from `left` to `right`.
///
/// Diffing a tree against itself yields an empty sequence, and applying the
/// result to `left` with [`crate::diff::apply_diff`] reconstructs `right`.
///
/// # Errors
///
/// Returns [`DiffError::Canonical`] when either tree contains a structurally
/// invalid keyed list. Trees built by the canonicalizer never trigger this.
pub fn diff_trees(
    left: &CanonicalTree,
    right: &CanonicalTree,
) -> Result<Vec<DiffEntry>, DiffError> {
    let mut entries = Vec::new();
    diff_nodes(left.as_value(), right.as_value(), &mut Vec::new(), &mut entries)?;
    Ok(entries)
}

// ============================================================================
// SECTION: Recursive Walk
// ============================================================================

/// Diffs two nodes at the same path, appending entries in order.
fn diff_nodes(
    left: &Value,
    right: &Value,
    path: &mut Vec<DiffSegment>,
    entries: &mut Vec<DiffEntry>,
) -> Result<(), DiffError> {
    if left == right {
        return Ok(());
    }
    match (left, right) {
        (Value::Object(left_map), Value::Object(right_map)) => {
            // Key union in sorted order; serde_json maps iterate sorted.
            let mut fields: Vec<&String> = left_map.keys().collect();
            for field in right_map.keys() {
                if !left_map.contains_key(field) {
                    fields.push(field);
                }
            }
            fields.sort();
            for field in fields {
                path.push(DiffSegment::Field(field.clone()));
                match (left_map.get(field), right_map.get(field)) {
                    (Some(old), None) => {
                        entries.push(DiffEntry::removed(DiffPath::new(path.clone()), old.clone()));
                    }
                    (None, Some(new)) => {
                        entries.push(DiffEntry::added(DiffPath::new(path.clone()), new.clone()));
                    }
                    (Some(old), Some(new)) => diff_nodes(old, new, path, entries)?,
                    (None, None) => {}
                }
                path.pop();
            }
            Ok(())
        }
        (Value::Array(left_items), Value::Array(right_items)) => {
            let left_key = identity_key_of(left_items)?;
            let right_key = identity_key_of(right_items)?;
            match (left_key, right_key) {
                (Some(lk), Some(rk)) if lk == rk => {
                    diff_keyed_lists(left_items, right_items, lk, path, entries)
                }
                _ => {
                    diff_sequences(left_items, right_items, path, entries);
                    Ok(())
                }
            }
        }
        _ => {
            entries.push(DiffEntry::changed(
                DiffPath::new(path.clone()),
                left.clone(),
                right.clone(),
            ));
            Ok(())
        }
    }
}

/// Diffs two keyed lists sharing an identity field, matching elements by key.
fn diff_keyed_lists(
    left_items: &[Value],
    right_items: &[Value],
    field: &'static str,
    path: &mut Vec<DiffSegment>,
    entries: &mut Vec<DiffEntry>,
) -> Result<(), DiffError> {
    let left_by_key = index_by_key(left_items, field);
    let right_by_key = index_by_key(right_items, field);
    let mut keys: Vec<&String> = left_by_key.keys().collect();
    for key in right_by_key.keys() {
        if !left_by_key.contains_key(key) {
            keys.push(key);
        }
    }
    keys.sort();
    for key in keys {
        path.push(DiffSegment::Key(key.clone()));
        match (left_by_key.get(key), right_by_key.get(key)) {
            (Some(old), None) => {
                entries.push(DiffEntry::removed(DiffPath::new(path.clone()), (*old).clone()));
            }
            (None, Some(new)) => {
                entries.push(DiffEntry::added(DiffPath::new(path.clone()), (*new).clone()));
            }
            (Some(old), Some(new)) => diff_nodes(old, new, path, entries)?,
            (None, None) => {}
        }
        path.pop();
    }
    Ok(())
}

/// Indexes keyed-list elements by their rendered identity value.
///
/// The lists were validated by [`identity_key_of`], so every element carries
/// a scalar identity; elements without one are unreachable and skipped.
fn index_by_key<'a>(items: &'a [Value], field: &'static str) -> BTreeMap<String, &'a Value> {
    let mut map = BTreeMap::new();
    for item in items {
        if let Some(key) = item.get(field).and_then(render_identity) {
            map.insert(key, item);
        }
    }
    map
}

// ============================================================================
// SECTION: Sequence Edit (LCS)
// ============================================================================

/// Diffs two unkeyed sequences with a longest-common-subsequence edit.
///
/// Removals carry the element's index in the left sequence; additions carry
/// its index in the right sequence. Elements are added and removed whole —
/// the walk never descends into positional elements, so index segments only
/// appear as the final segment of a path.
fn diff_sequences(
    left_items: &[Value],
    right_items: &[Value],
    path: &mut Vec<DiffSegment>,
    entries: &mut Vec<DiffEntry>,
) {
    // dp[i][j] = LCS length of left[i..] and right[j..].
    let rows = left_items.len() + 1;
    let cols = right_items.len() + 1;
    let mut dp = vec![vec![0_usize; cols]; rows];
    for i in (0..left_items.len()).rev() {
        for j in (0..right_items.len()).rev() {
            dp[i][j] = if left_items[i] == right_items[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }
    let mut i = 0;
    let mut j = 0;
    while i < left_items.len() || j < right_items.len() {
        if i < left_items.len()
            && j < right_items.len()
            && left_items[i] == right_items[j]
            && dp[i][j] == dp[i + 1][j + 1] + 1
        {
            i += 1;
            j += 1;
        } else if j == right_items.len()
            || (i < left_items.len() && dp[i + 1][j] >= dp[i][j + 1])
        {
            path.push(DiffSegment::Index(i));
            entries.push(DiffEntry::removed(DiffPath::new(path.clone()), left_items[i].clone()));
            path.pop();
            i += 1;
        } else {
            path.push(DiffSegment::Index(j));
            entries.push(DiffEntry::added(DiffPath::new(path.clone()), right_items[j].clone()));
            path.pop();
            j += 1;
        }
    }
}
