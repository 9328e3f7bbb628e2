// crates/netdrift-core/src/runtime/mod.rs
// ============================================================================
// Module: Netdrift Runtime
// Description: Drift detection over ingested configuration snapshots.
// Purpose: Tie canonicalization, hashing, diffing, and storage together.
// Dependencies: serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! The [`DriftDetector`] consumes raw discovered configuration, persists it
//! as the device's snapshot, and compares every active intent of the device
//! against its slice of the snapshot. Hash mismatches become
//! [`crate::DriftEvent`]s that are persisted and handed to a
//! [`DriftNotifier`] for webhook fan-out.

mod detector;

pub use detector::DetectorError;
pub use detector::DriftDetector;
pub use detector::DriftNotifier;
pub use detector::InvariantViolation;
pub use detector::NullNotifier;
pub use detector::SnapshotOutcome;
