// crates/netdrift-core/src/canonical/mod.rs
// ============================================================================
// Module: Netdrift Canonicalizer
// Description: Generic tree normalization for configuration payloads.
// Purpose: Make semantically equal payloads byte-identical for hashing and diffing.
// Dependencies: serde_json, serde_jcs, thiserror
// ============================================================================

//! ## Overview
//! The canonicalizer turns a raw configuration payload (nested maps and lists
//! of scalars, as produced by whatever vendor parser the transport adapter
//! uses) into a [`CanonicalTree`]:
//! - map keys serialize in RFC 8785 (JCS) order;
//! - lists whose elements all carry a shared identity field are *keyed lists*
//!   and are reordered by that key;
//! - lists without an identity field keep their original order;
//! - string scalars are trimmed of surrounding whitespace.
//!
//! Only structural normalization is performed. Casing, unit, or enum
//! normalization is deliberately absent — collapsing those would hide real
//! semantic drift.
//!
//! Security posture: payloads are untrusted input from external adapters; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::scope::ScopePath;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identity field candidates for keyed-list detection, in priority order.
///
/// The first candidate present on any element of a list becomes that list's
/// identity key; every element must then carry it.
pub const IDENTITY_KEY_CANDIDATES: &[&str] =
    &["id", "name", "ip", "address", "neighbor", "interface", "key", "label"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural canonicalization failure.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizationError {
    /// The payload root is not a map.
    #[error("configuration root must be an object")]
    RootNotObject,
    /// A keyed-list element is missing the list's identity key.
    #[error("keyed-list element {index} is missing identity key '{field}'")]
    MissingIdentityKey {
        /// Identity field the list was keyed on.
        field: &'static str,
        /// Position of the offending element in the original list.
        index: usize,
    },
    /// A keyed-list element carries a non-scalar identity value.
    #[error("keyed-list element {index} has a non-scalar value for identity key '{field}'")]
    NonScalarIdentityValue {
        /// Identity field the list was keyed on.
        field: &'static str,
        /// Position of the offending element in the original list.
        index: usize,
    },
    /// Two keyed-list elements share the same identity value.
    #[error("duplicate identity value '{key}' for identity key '{field}'")]
    DuplicateIdentityValue {
        /// Identity field the list was keyed on.
        field: &'static str,
        /// Duplicated rendered key.
        key: String,
    },
    /// Stored canonical text failed to parse, indicating corruption.
    #[error("stored canonical content is not valid JSON: {0}")]
    InvalidStoredContent(String),
    /// Canonical serialization failed (for example on a non-finite float).
    #[error("canonical serialization failed: {0}")]
    Serialization(String),
}

/// A scope path does not exist in a canonical tree.
///
/// Extraction failures are a detectable drift condition, not a system
/// failure: the detector records them and treats the scope as removed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scope path '{path}' not found: {reason}")]
pub struct ScopeExtractionError {
    /// The scope path that failed to resolve.
    pub path: String,
    /// Which segment failed and why.
    pub reason: String,
}

impl ScopeExtractionError {
    /// Creates an extraction error for the given path.
    fn new(path: &ScopePath, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Canonical Tree
// ============================================================================

/// A structurally normalized configuration tree.
///
/// # Invariants
/// - Keyed lists are ordered by their identity key; unkeyed lists keep their
///   original order; string scalars are trimmed.
/// - Equal trees serialize to byte-identical canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTree(Value);

impl CanonicalTree {
    /// Canonicalizes a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError`] when the root is not an object or a
    /// keyed list is structurally invalid.
    pub fn canonicalize(raw: &Value) -> Result<Self, CanonicalizationError> {
        if !raw.is_object() {
            return Err(CanonicalizationError::RootNotObject);
        }
        Ok(Self(normalize_value(raw)?))
    }

    /// Re-builds a tree from stored canonical JSON text.
    ///
    /// The text is re-normalized on the way in, so a tree loaded from storage
    /// carries the same invariants as a freshly canonicalized one.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError`] when the text is not valid JSON or
    /// fails structural validation.
    pub fn from_canonical_json(text: &str) -> Result<Self, CanonicalizationError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|err| CanonicalizationError::InvalidStoredContent(err.to_string()))?;
        Ok(Self(normalize_value(&value)?))
    }

    /// Wraps an already-normalized subtree.
    ///
    /// Callers must only pass values extracted from an existing canonical
    /// tree.
    pub(crate) const fn from_normalized(value: Value) -> Self {
        Self(value)
    }

    /// Returns the underlying JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the tree and returns the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Serializes the tree to canonical (RFC 8785) JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::Serialization`] when the tree cannot
    /// be canonically serialized (for example non-finite floats).
    pub fn to_canonical_json(&self) -> Result<String, CanonicalizationError> {
        serde_jcs::to_string(&self.0)
            .map_err(|err| CanonicalizationError::Serialization(err.to_string()))
    }

    /// Extracts the subtree at a scope path.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExtractionError`] when any segment does not resolve:
    /// a missing field, a non-map node where a field is addressed, a
    /// non-keyed list where a key is addressed, or an absent key.
    pub fn slice(&self, path: &ScopePath) -> Result<Self, ScopeExtractionError> {
        let mut node = &self.0;
        for segment in path.segments() {
            let Some(map) = node.as_object() else {
                return Err(ScopeExtractionError::new(
                    path,
                    format!("'{}' addressed on a non-map node", segment.field),
                ));
            };
            let Some(child) = map.get(&segment.field) else {
                return Err(ScopeExtractionError::new(
                    path,
                    format!("field '{}' is absent", segment.field),
                ));
            };
            node = child;
            if let Some(key) = &segment.key {
                node = select_keyed_element(node, key)
                    .ok_or_else(|| ScopeExtractionError::new(
                        path,
                        format!("no element with key '{key}' under '{}'", segment.field),
                    ))?;
            }
        }
        Ok(Self(node.clone()))
    }
}

impl fmt::Display for CanonicalTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_canonical_json() {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Finds the keyed-list element whose rendered identity equals `key`.
fn select_keyed_element<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    let items = node.as_array()?;
    let identity = identity_key_of(items).ok().flatten()?;
    items.iter().find(|item| {
        item.get(identity).and_then(render_identity).is_some_and(|rendered| rendered == key)
    })
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Recursively normalizes one node.
///
/// Also used when reconstructing a tree from an edited value, so keyed lists
/// regain sorted order after an edit.
pub(crate) fn normalize_value(value: &Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::String(text) => Ok(Value::String(text.trim().to_string())),
        Value::Object(map) => {
            let mut normalized = Map::new();
            for (key, child) in map {
                normalized.insert(key.clone(), normalize_value(child)?);
            }
            Ok(Value::Object(normalized))
        }
        Value::Array(items) => {
            let mut normalized = Vec::with_capacity(items.len());
            for item in items {
                normalized.push(normalize_value(item)?);
            }
            if let Some(field) = identity_key_of(&normalized)? {
                sort_keyed_list(&mut normalized, field);
            }
            Ok(Value::Array(normalized))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
    }
}

/// Determines whether a list is keyed and by which identity field.
///
/// A list is keyed when every element is an object and some candidate field
/// is present on all of them. The first candidate (in priority order) present
/// on *any* element decides: partial presence of that candidate is a
/// structural error rather than a silent fallback, per the keyed-list
/// contract.
///
/// # Errors
///
/// Returns [`CanonicalizationError`] on partial presence, non-scalar identity
/// values, or duplicate identity values.
pub(crate) fn identity_key_of(
    items: &[Value],
) -> Result<Option<&'static str>, CanonicalizationError> {
    if items.is_empty() || !items.iter().all(Value::is_object) {
        return Ok(None);
    }
    for field in IDENTITY_KEY_CANDIDATES {
        let carrying = items.iter().filter(|item| item.get(*field).is_some()).count();
        if carrying == 0 {
            continue;
        }
        if carrying < items.len() {
            let index = items
                .iter()
                .position(|item| item.get(*field).is_none())
                .unwrap_or(0);
            return Err(CanonicalizationError::MissingIdentityKey {
                field,
                index,
            });
        }
        let mut seen = BTreeSet::new();
        for (index, item) in items.iter().enumerate() {
            let rendered = item
                .get(*field)
                .and_then(render_identity)
                .ok_or(CanonicalizationError::NonScalarIdentityValue {
                    field,
                    index,
                })?;
            if !seen.insert(rendered.clone()) {
                return Err(CanonicalizationError::DuplicateIdentityValue {
                    field,
                    key: rendered,
                });
            }
        }
        return Ok(Some(field));
    }
    Ok(None)
}

/// Renders a scalar identity value as its stable key string.
///
/// Null and composite values have no identity rendering.
pub(crate) fn render_identity(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Sorts a keyed list by the rendered identity value.
///
/// Callers must have validated the list with [`identity_key_of`] first, so
/// every element carries a scalar identity.
fn sort_keyed_list(items: &mut [Value], field: &'static str) {
    items.sort_by_key(|item| item.get(field).and_then(render_identity).unwrap_or_default());
}
