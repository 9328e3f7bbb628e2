// crates/netdrift-core/src/lib.rs
// ============================================================================
// Module: Netdrift Core
// Description: Intent and drift engine for network-device configuration intent.
// Purpose: Provide canonicalization, hashing, diffing, storage seams, and drift detection.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror, uuid
// ============================================================================

//! ## Overview
//! netdrift records *configuration intent* — the desired state a user declares
//! for a network device or a sub-part of one — and compares it against
//! discovered actual configuration. This crate is the transport-agnostic core:
//! the canonical tree representation, content hashing, structural diffing, the
//! intent store contract, and the drift detector that ties them together.
//!
//! Netdrift never mutates device configuration. No operation in this crate (or
//! any crate built on it) writes back to a device; diff output is informational
//! and consumed by an external orchestrator.
//!
//! Security posture: raw configuration payloads arrive from external transport
//! adapters and are untrusted; see `Docs/security/threat_model.md`.

pub mod canonical;
pub mod core;
pub mod diff;
pub mod hashing;
pub mod interfaces;
pub mod runtime;
pub mod store;

pub use crate::canonical::CanonicalTree;
pub use crate::canonical::CanonicalizationError;
pub use crate::canonical::ScopeExtractionError;
pub use crate::core::drift::DriftEvent;
pub use crate::core::drift::EventType;
pub use crate::core::identifiers::DeliveryId;
pub use crate::core::identifiers::DeviceId;
pub use crate::core::identifiers::EventId;
pub use crate::core::identifiers::SubscriptionId;
pub use crate::core::identifiers::ValidationError;
pub use crate::core::intent::ConfigSnapshot;
pub use crate::core::intent::IntentRecord;
pub use crate::core::scope::IntentScope;
pub use crate::core::scope::ScopePath;
pub use crate::core::time::Timestamp;
pub use crate::core::webhook::DeliveryStatus;
pub use crate::core::webhook::ScopeFilter;
pub use crate::core::webhook::WebhookDelivery;
pub use crate::core::webhook::WebhookSubscription;
pub use crate::diff::DiffEntry;
pub use crate::diff::DiffOp;
pub use crate::diff::DiffPath;
pub use crate::hashing::HashAlgorithm;
pub use crate::hashing::HashDigest;
pub use crate::interfaces::DeliveryQueue;
pub use crate::interfaces::DriftEventLog;
pub use crate::interfaces::IntentStore;
pub use crate::interfaces::SnapshotStore;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::SubscriptionRegistry;
pub use crate::runtime::DetectorError;
pub use crate::runtime::DriftDetector;
pub use crate::runtime::DriftNotifier;
pub use crate::runtime::InvariantViolation;
pub use crate::runtime::NullNotifier;
pub use crate::runtime::SnapshotOutcome;
pub use crate::store::MemoryStore;
