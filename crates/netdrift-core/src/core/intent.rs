// crates/netdrift-core/src/core/intent.rs
// ============================================================================
// Module: Netdrift Intent Records
// Description: Stored intent records and discovered configuration snapshots.
// Purpose: Define the persisted shapes compared by the drift detector.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`IntentRecord`] is the user-declared desired state for one scope of a
//! device; a [`ConfigSnapshot`] is the most recently discovered actual state
//! of the whole device. Both store their content as canonical JSON text so
//! byte equality implies semantic equality.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::canonical::CanonicalTree;
use crate::canonical::CanonicalizationError;
use crate::core::identifiers::DeviceId;
use crate::core::scope::IntentScope;
use crate::core::time::Timestamp;
use crate::hashing::HashDigest;

// ============================================================================
// SECTION: Intent Record
// ============================================================================

/// One stored intent: desired configuration for a `(device, scope)` pair.
///
/// # Invariants
/// - `content_hash` is the canonical-JSON SHA-256 of `canonical_content`.
/// - `version` starts at 1 and increments on every successful write of the
///   same `(device, scope)` pair, including re-creations after deletion.
/// - Records are mutated only through optimistic-concurrency writes; prior
///   versions are retained in an append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRecord {
    /// Device this intent belongs to.
    pub device_id: DeviceId,
    /// Scope covered by this intent.
    pub scope: IntentScope,
    /// Canonical JSON text of the desired configuration.
    pub canonical_content: String,
    /// Content fingerprint of `canonical_content`.
    pub content_hash: HashDigest,
    /// Optimistic-concurrency version, 1-based.
    pub version: u64,
    /// When this scope was first created.
    pub created_at: Timestamp,
    /// When this version was written.
    pub updated_at: Timestamp,
}

impl IntentRecord {
    /// Re-parses the stored canonical content into a tree for diffing.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError`] when the stored text is not valid
    /// canonical JSON, which indicates store corruption.
    pub fn canonical_tree(&self) -> Result<CanonicalTree, CanonicalizationError> {
        CanonicalTree::from_canonical_json(&self.canonical_content)
    }
}

// ============================================================================
// SECTION: Config Snapshot
// ============================================================================

/// Most recent discovered configuration for a device.
///
/// # Invariants
/// - One snapshot is retained per device; scope views are derived by slicing
///   the canonical tree, never stored separately.
/// - `content_hash` is the canonical-JSON SHA-256 of `canonical_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Device the snapshot was fetched from.
    pub device_id: DeviceId,
    /// Canonical JSON text of the discovered configuration.
    pub canonical_content: String,
    /// Content fingerprint of `canonical_content`.
    pub content_hash: HashDigest,
    /// When the external adapter fetched the configuration.
    pub fetched_at: Timestamp,
}

impl ConfigSnapshot {
    /// Re-parses the stored canonical content into a tree for slicing.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError`] when the stored text is not valid
    /// canonical JSON, which indicates store corruption.
    pub fn canonical_tree(&self) -> Result<CanonicalTree, CanonicalizationError> {
        CanonicalTree::from_canonical_json(&self.canonical_content)
    }
}
