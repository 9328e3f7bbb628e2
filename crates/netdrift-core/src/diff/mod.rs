// crates/netdrift-core/src/diff/mod.rs
// ============================================================================
// Module: Netdrift Diff Engine
// Description: Structural deltas between canonical configuration trees.
// Purpose: Explain *what* drifted, not just that hashes differ.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The diff engine compares two canonical trees and produces an ordered
//! sequence of [`DiffEntry`] values. Keyed maps and keyed lists match
//! children by key; unkeyed sequences use a longest-common-subsequence edit
//! so a single insertion never reads as a full-list replacement.
//!
//! Two guarantees hold: diffing a tree against itself yields an empty
//! sequence, and [`apply_diff`] reconstructs the right-hand tree from the
//! left-hand tree plus the diff (used for test seeding).

mod apply;
mod engine;
mod model;

pub use apply::apply_diff;
pub use engine::diff_trees;
pub use model::DiffEntry;
pub use model::DiffError;
pub use model::DiffOp;
pub use model::DiffPath;
pub use model::DiffSegment;
