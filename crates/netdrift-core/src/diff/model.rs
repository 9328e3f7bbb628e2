// crates/netdrift-core/src/diff/model.rs
// ============================================================================
// Module: Netdrift Diff Model
// Description: Diff operation, path, and entry types.
// Purpose: Define the wire shape of structural deltas.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Diff output types. Paths render as strings like
//! `bgp.neighbors[10.0.0.1].remote_as`: dot-separated fields, keyed-list
//! keys in brackets, positional sequence indices as bare digits in brackets.
//! Entries serialize deterministically; collections throughout use sorted
//! orderings so equal diffs are byte-equal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde::de;
use serde_json::Value;
use thiserror::Error;

use crate::canonical::CanonicalizationError;
use crate::core::scope::ScopePath;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Diff computation or application failure.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// A tree handed to the engine violated canonical invariants.
    #[error(transparent)]
    Canonical(#[from] CanonicalizationError),
    /// A diff entry addressed a node absent from the base tree.
    #[error("diff target not found at '{path}'")]
    TargetNotFound {
        /// Rendered path of the missing target.
        path: String,
    },
    /// A diff entry is inconsistent with its operation.
    #[error("invalid diff entry at '{path}': {reason}")]
    InvalidEntry {
        /// Rendered path of the offending entry.
        path: String,
        /// Why the entry cannot be applied.
        reason: String,
    },
    /// A diff path string failed to parse.
    #[error("invalid diff path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path text.
        path: String,
        /// Why the path cannot be parsed.
        reason: String,
    },
}

// ============================================================================
// SECTION: Diff Operations
// ============================================================================

/// Kind of structural change.
///
/// # Invariants
/// - Variants are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOp {
    /// Present only in the right-hand tree.
    Added,
    /// Present only in the left-hand tree.
    Removed,
    /// Present in both trees with differing content.
    Changed,
}

/// One step of a diff path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiffSegment {
    /// Map field.
    Field(String),
    /// Keyed-list element selected by its rendered identity value.
    Key(String),
    /// Positional element of an unkeyed sequence.
    Index(usize),
}

/// Structured address of a changed node, relative to the diffed root.
///
/// # Invariants
/// - An empty path addresses the root itself.
/// - `Index` segments only ever appear as the final segment: unkeyed
///   sequence elements are added or removed whole, never descended into.
/// - A bracketed component that is all ASCII digits parses as `Index`;
///   keyed-list identity values are therefore never bare integers in paths
///   that must round-trip through text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DiffPath(Vec<DiffSegment>);

impl DiffPath {
    /// Creates a path from segments.
    #[must_use]
    pub const fn new(segments: Vec<DiffSegment>) -> Self {
        Self(segments)
    }

    /// Returns the path segments in order.
    #[must_use]
    pub fn segments(&self) -> &[DiffSegment] {
        &self.0
    }

    /// Builds a diff path covering an entire intent scope path.
    #[must_use]
    pub fn from_scope_path(path: &ScopePath) -> Self {
        let mut segments = Vec::new();
        for segment in path.segments() {
            segments.push(DiffSegment::Field(segment.field.clone()));
            if let Some(key) = &segment.key {
                segments.push(DiffSegment::Key(key.clone()));
            }
        }
        Self(segments)
    }

    /// Parses a rendered diff path.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::InvalidPath`] on malformed text.
    pub fn parse(raw: &str) -> Result<Self, DiffError> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();
        let mut expect_field = true;
        while let Some(ch) = chars.next() {
            match ch {
                '.' => {
                    flush_field(&mut current, &mut segments, raw, expect_field)?;
                    expect_field = true;
                }
                '[' => {
                    if !current.is_empty() || expect_field {
                        flush_field(&mut current, &mut segments, raw, expect_field)?;
                    }
                    expect_field = false;
                    let mut key = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            closed = true;
                            break;
                        }
                        key.push(inner);
                    }
                    if !closed {
                        return Err(invalid_path(raw, "unbalanced '['"));
                    }
                    if key.is_empty() {
                        return Err(invalid_path(raw, "empty bracket component"));
                    }
                    if key.bytes().all(|byte| byte.is_ascii_digit()) {
                        let index: usize =
                            key.parse().map_err(|_| invalid_path(raw, "index overflow"))?;
                        segments.push(DiffSegment::Index(index));
                    } else {
                        segments.push(DiffSegment::Key(key));
                    }
                    if let Some(next) = chars.peek() {
                        match next {
                            '.' | '[' => {}
                            _ => return Err(invalid_path(raw, "trailing characters after ']'")),
                        }
                    }
                }
                ']' => return Err(invalid_path(raw, "unbalanced ']'")),
                _ => {
                    current.push(ch);
                    expect_field = true;
                }
            }
        }
        if !current.is_empty() {
            flush_field(&mut current, &mut segments, raw, true)?;
        } else if expect_field {
            return Err(invalid_path(raw, "empty trailing segment"));
        }
        Ok(Self(segments))
    }
}

/// Pushes an accumulated field component, rejecting empty fields.
fn flush_field(
    current: &mut String,
    segments: &mut Vec<DiffSegment>,
    raw: &str,
    required: bool,
) -> Result<(), DiffError> {
    if current.is_empty() {
        if required {
            return Err(invalid_path(raw, "empty field segment"));
        }
        return Ok(());
    }
    segments.push(DiffSegment::Field(std::mem::take(current)));
    Ok(())
}

/// Builds an [`DiffError::InvalidPath`] for the raw text.
fn invalid_path(raw: &str, reason: &str) -> DiffError {
    DiffError::InvalidPath {
        path: raw.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for DiffPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                DiffSegment::Field(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                DiffSegment::Key(key) => write!(f, "[{key}]")?,
                DiffSegment::Index(index) => write!(f, "[{index}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

impl FromStr for DiffPath {
    type Err = DiffError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl Serialize for DiffPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DiffPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

// ============================================================================
// SECTION: Diff Entry
// ============================================================================

/// One structural change between two canonical trees.
///
/// # Invariants
/// - `Added` carries `new_value` only; `Removed` carries `old_value` only;
///   `Changed` carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Kind of change.
    pub op: DiffOp,
    /// Address of the changed node.
    pub path: DiffPath,
    /// Left-hand value, for removals and changes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_value: Option<Value>,
    /// Right-hand value, for additions and changes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_value: Option<Value>,
}

impl DiffEntry {
    /// Creates an `Added` entry.
    #[must_use]
    pub const fn added(path: DiffPath, new_value: Value) -> Self {
        Self {
            op: DiffOp::Added,
            path,
            old_value: None,
            new_value: Some(new_value),
        }
    }

    /// Creates a `Removed` entry.
    #[must_use]
    pub const fn removed(path: DiffPath, old_value: Value) -> Self {
        Self {
            op: DiffOp::Removed,
            path,
            old_value: Some(old_value),
            new_value: None,
        }
    }

    /// Creates a `Changed` entry.
    #[must_use]
    pub const fn changed(path: DiffPath, old_value: Value, new_value: Value) -> Self {
        Self {
            op: DiffOp::Changed,
            path,
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }
}
