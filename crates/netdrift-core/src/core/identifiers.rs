// crates/netdrift-core/src/core/identifiers.rs
// ============================================================================
// Module: Netdrift Identifiers
// Description: Canonical opaque identifiers for devices, events, and deliveries.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout netdrift.
//! Device identifiers are caller-supplied opaque strings validated at the
//! boundary; event, subscription, and delivery identifiers are UUIDs minted
//! by netdrift itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Boundary validation failure for caller-supplied values.
///
/// # Invariants
/// - `field` names the rejected input; `reason` is human-readable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Name of the rejected field.
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ValidationError {
    /// Creates a validation error for the named field.
    #[must_use]
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Device Identifier
// ============================================================================

/// Device identifier owned by the caller.
///
/// # Invariants
/// - Non-empty, no whitespace, no `/` (device ids appear in URL paths).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parses a device identifier, rejecting shapes that cannot round-trip
    /// through URL paths or storage keys.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the value is empty, contains
    /// whitespace, or contains `/`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::new("device_id", "must not be empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(ValidationError::new("device_id", "must not contain whitespace"));
        }
        if raw.contains('/') {
            return Err(ValidationError::new("device_id", "must not contain '/'"));
        }
        Ok(Self(raw))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Generated Identifiers
// ============================================================================

/// Drift event identifier.
///
/// # Invariants
/// - UUID minted at event creation; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Mints a new random event identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an event identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the value is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|err| ValidationError::new("event_id", err.to_string()))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Webhook subscription identifier.
///
/// # Invariants
/// - UUID minted at subscribe time; stable across activation changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Mints a new random subscription identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a subscription identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the value is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|err| ValidationError::new("subscription_id", err.to_string()))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Webhook delivery identifier.
///
/// # Invariants
/// - UUID minted at enqueue time; delivery rows are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Mints a new random delivery identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a delivery identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the value is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|err| ValidationError::new("delivery_id", err.to_string()))
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
