// crates/netdrift-core/src/diff/apply.rs
// ============================================================================
// Module: Netdrift Diff Application
// Description: Reconstructs a tree from a base tree plus a diff.
// Purpose: Guarantee diffs are complete — apply(left, diff(left, right)) == right.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`apply_diff`] replays a [`DiffEntry`] sequence produced by
//! [`crate::diff::diff_trees`] onto its left-hand tree, yielding the
//! right-hand tree. Positional sequence edits are grouped per parent list and
//! applied removals-first so indices stay meaningful. The result is
//! re-normalized, so keyed lists regain canonical order after keyed edits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::canonical::CanonicalTree;
use crate::canonical::identity_key_of;
use crate::canonical::normalize_value;
use crate::canonical::render_identity;
use crate::diff::model::DiffEntry;
use crate::diff::model::DiffError;
use crate::diff::model::DiffOp;
use crate::diff::model::DiffPath;
use crate::diff::model::DiffSegment;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Applies a diff to a base tree, producing the edited tree.
///
/// Entries must come from [`crate::diff::diff_trees`] over the same base:
/// arbitrary hand-built entries may address nodes the base does not have.
///
/// # Errors
///
/// Returns [`DiffError::TargetNotFound`] when an entry addresses a missing
/// node and [`DiffError::InvalidEntry`] when an entry is inconsistent with
/// its operation (for example `Added` without a `new_value`).
pub fn apply_diff(base: &CanonicalTree, entries: &[DiffEntry]) -> Result<CanonicalTree, DiffError> {
    let mut root = base.as_value().clone();
    let mut sequence_edits: BTreeMap<Vec<DiffSegment>, SequenceEdit> = BTreeMap::new();
    for entry in entries {
        let segments = entry.path.segments();
        if let Some(DiffSegment::Index(index)) = segments.last() {
            let parent: Vec<DiffSegment> = segments[..segments.len() - 1].to_vec();
            let edit = sequence_edits.entry(parent).or_default();
            match entry.op {
                DiffOp::Removed => edit.removals.push(*index),
                DiffOp::Added => {
                    let value = require_new_value(entry)?;
                    edit.additions.push((*index, value));
                }
                DiffOp::Changed => {
                    return Err(invalid(entry, "positional elements change by remove and add"));
                }
            }
        } else {
            apply_entry(&mut root, entry)?;
        }
    }
    for (parent, edit) in sequence_edits {
        apply_sequence_edit(&mut root, &parent, edit)?;
    }
    let normalized = normalize_value(&root)?;
    Ok(CanonicalTree::from_normalized(normalized))
}

// ============================================================================
// SECTION: Single-Entry Application
// ============================================================================

/// Applies one field or keyed-list entry.
fn apply_entry(root: &mut Value, entry: &DiffEntry) -> Result<(), DiffError> {
    let segments = entry.path.segments();
    let Some((last, parents)) = segments.split_last() else {
        // Empty path addresses the root itself.
        return match entry.op {
            DiffOp::Changed => {
                *root = require_new_value(entry)?;
                Ok(())
            }
            DiffOp::Added | DiffOp::Removed => {
                Err(invalid(entry, "root can only be changed, not added or removed"))
            }
        };
    };
    let parent = navigate_mut(root, parents, &entry.path)?;
    match last {
        DiffSegment::Field(name) => {
            let Some(map) = parent.as_object_mut() else {
                return Err(not_found(&entry.path));
            };
            match entry.op {
                DiffOp::Added => {
                    map.insert(name.clone(), require_new_value(entry)?);
                }
                DiffOp::Removed => {
                    if map.remove(name).is_none() {
                        return Err(not_found(&entry.path));
                    }
                }
                DiffOp::Changed => {
                    let Some(slot) = map.get_mut(name) else {
                        return Err(not_found(&entry.path));
                    };
                    *slot = require_new_value(entry)?;
                }
            }
        }
        DiffSegment::Key(key) => {
            let Some(items) = parent.as_array_mut() else {
                return Err(not_found(&entry.path));
            };
            match entry.op {
                DiffOp::Added => {
                    // Re-normalization after application restores key order.
                    items.push(require_new_value(entry)?);
                }
                DiffOp::Removed => {
                    let position = keyed_position(items, key).ok_or_else(|| {
                        not_found(&entry.path)
                    })?;
                    items.remove(position);
                }
                DiffOp::Changed => {
                    let position = keyed_position(items, key).ok_or_else(|| {
                        not_found(&entry.path)
                    })?;
                    items[position] = require_new_value(entry)?;
                }
            }
        }
        DiffSegment::Index(_) => {
            // Grouped and applied by apply_sequence_edit; unreachable here.
            return Err(invalid(entry, "positional edits are applied as grouped sequence edits"));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Sequence Edits
// ============================================================================

/// Accumulated positional edits for one unkeyed sequence.
#[derive(Debug, Default)]
struct SequenceEdit {
    /// Indices (in the base sequence) of removed elements.
    removals: Vec<usize>,
    /// Indices (in the edited sequence) and values of inserted elements.
    additions: Vec<(usize, Value)>,
}

/// Applies grouped positional edits to the sequence at `parent`.
fn apply_sequence_edit(
    root: &mut Value,
    parent: &[DiffSegment],
    mut edit: SequenceEdit,
) -> Result<(), DiffError> {
    let rendered = DiffPath::new(parent.to_vec());
    let node = navigate_mut(root, parent, &rendered)?;
    let Some(items) = node.as_array_mut() else {
        return Err(not_found(&rendered));
    };
    // Removals by base index, descending, so earlier indices stay valid.
    edit.removals.sort_unstable_by(|a, b| b.cmp(a));
    for index in edit.removals {
        if index >= items.len() {
            return Err(not_found(&rendered));
        }
        items.remove(index);
    }
    // Insertions by target index, ascending, reconstruct the edited order.
    edit.additions.sort_by_key(|(index, _)| *index);
    for (index, value) in edit.additions {
        let position = index.min(items.len());
        items.insert(position, value);
    }
    Ok(())
}

// ============================================================================
// SECTION: Navigation
// ============================================================================

/// Walks to the node addressed by `segments`, mutably.
fn navigate_mut<'a>(
    root: &'a mut Value,
    segments: &[DiffSegment],
    full_path: &DiffPath,
) -> Result<&'a mut Value, DiffError> {
    let mut node = root;
    for segment in segments {
        node = match segment {
            DiffSegment::Field(name) => node
                .as_object_mut()
                .and_then(|map| map.get_mut(name))
                .ok_or_else(|| not_found(full_path))?,
            DiffSegment::Key(key) => {
                let items = node.as_array_mut().ok_or_else(|| not_found(full_path))?;
                let position = keyed_position(items, key).ok_or_else(|| not_found(full_path))?;
                &mut items[position]
            }
            DiffSegment::Index(index) => {
                let items = node.as_array_mut().ok_or_else(|| not_found(full_path))?;
                items.get_mut(*index).ok_or_else(|| not_found(full_path))?
            }
        };
    }
    Ok(node)
}

/// Finds the position of the keyed-list element with the given identity.
fn keyed_position(items: &[Value], key: &str) -> Option<usize> {
    let field = identity_key_of(items).ok().flatten()?;
    items.iter().position(|item| {
        item.get(field).and_then(render_identity).is_some_and(|rendered| rendered == key)
    })
}

// ============================================================================
// SECTION: Error Helpers
// ============================================================================

/// Extracts the entry's `new_value` or rejects the entry.
fn require_new_value(entry: &DiffEntry) -> Result<Value, DiffError> {
    entry.new_value.clone().ok_or_else(|| invalid(entry, "missing new_value"))
}

/// Builds an [`DiffError::InvalidEntry`] for the entry.
fn invalid(entry: &DiffEntry, reason: &str) -> DiffError {
    DiffError::InvalidEntry {
        path: entry.path.to_string(),
        reason: reason.to_string(),
    }
}

/// Builds a [`DiffError::TargetNotFound`] for the path.
fn not_found(path: &DiffPath) -> DiffError {
    DiffError::TargetNotFound {
        path: path.to_string(),
    }
}
