// crates/netdrift-core/src/core/scope.rs
// ============================================================================
// Module: Netdrift Intent Scopes
// Description: Full/partial intent scopes and structured scope paths.
// Purpose: Address whole devices or sub-trees of a device's configuration.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! An intent is either *full* (the whole device configuration) or *partial*
//! (one addressable sub-tree). Partial scopes are addressed by a
//! [`ScopePath`]: a dot-separated sequence of segments, each a field name
//! optionally qualified by a keyed-list key in brackets, for example
//! `bgp.neighbor[10.0.0.1]`. Paths are flat; netdrift defines no nesting or
//! precedence semantics between partial scopes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde::de;

use crate::core::identifiers::ValidationError;

// ============================================================================
// SECTION: Scope Path
// ============================================================================

/// One segment of a scope path: a field name with an optional list key.
///
/// # Invariants
/// - `field` is non-empty and contains none of `.`, `[`, `]`.
/// - `key`, when present, is non-empty and contains no `]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeSegment {
    /// Field name within a map node.
    pub field: String,
    /// Identity key selecting one element of a keyed list.
    pub key: Option<String>,
}

impl fmt::Display for ScopeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}[{}]", self.field, key),
            None => self.field.fmt(f),
        }
    }
}

/// Structured address of a sub-tree within a device configuration.
///
/// # Invariants
/// - Always contains at least one segment.
/// - Rendering with `Display` and re-parsing round-trips exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopePath(Vec<ScopeSegment>);

impl ScopePath {
    /// Returns the path segments in order.
    #[must_use]
    pub fn segments(&self) -> &[ScopeSegment] {
        &self.0
    }

    /// Parses a scope path such as `bgp.neighbor[10.0.0.1]`.
    ///
    /// Dots inside bracketed keys are part of the key, not segment
    /// separators.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] on empty paths, empty fields or keys,
    /// unbalanced brackets, or trailing characters after a key.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::new("scope_path", "must not be empty"));
        }
        let mut segments = Vec::new();
        for piece in split_segments(raw)? {
            segments.push(parse_segment(&piece)?);
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            segment.fmt(f)?;
        }
        Ok(())
    }
}

impl FromStr for ScopePath {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl Serialize for ScopePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScopePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

/// Splits a raw path into segment strings at dots outside brackets.
fn split_segments(raw: &str) -> Result<Vec<String>, ValidationError> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0_u32;
    for ch in raw.chars() {
        match ch {
            '[' => {
                if depth > 0 {
                    return Err(ValidationError::new("scope_path", "nested '[' is not allowed"));
                }
                depth += 1;
                current.push(ch);
            }
            ']' => {
                if depth == 0 {
                    return Err(ValidationError::new("scope_path", "unbalanced ']'"));
                }
                depth -= 1;
                current.push(ch);
            }
            '.' if depth == 0 => {
                pieces.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if depth != 0 {
        return Err(ValidationError::new("scope_path", "unbalanced '['"));
    }
    pieces.push(current);
    Ok(pieces)
}

/// Parses one `field` or `field[key]` segment.
fn parse_segment(piece: &str) -> Result<ScopeSegment, ValidationError> {
    if piece.is_empty() {
        return Err(ValidationError::new("scope_path", "empty segment"));
    }
    let Some(open) = piece.find('[') else {
        return Ok(ScopeSegment {
            field: piece.to_string(),
            key: None,
        });
    };
    let field = &piece[.. open];
    if field.is_empty() {
        return Err(ValidationError::new("scope_path", "segment is missing a field name"));
    }
    let rest = &piece[open + 1 ..];
    let Some(close) = rest.find(']') else {
        return Err(ValidationError::new("scope_path", "unbalanced '['"));
    };
    let key = &rest[.. close];
    if key.is_empty() {
        return Err(ValidationError::new("scope_path", "empty key in segment"));
    }
    if close + 1 != rest.len() {
        return Err(ValidationError::new("scope_path", "trailing characters after key"));
    }
    Ok(ScopeSegment {
        field: field.to_string(),
        key: Some(key.to_string()),
    })
}

// ============================================================================
// SECTION: Intent Scope
// ============================================================================

/// Scope of an intent record: the whole device or one sub-tree.
///
/// # Invariants
/// - At most one `Full` intent record exists per device.
/// - Partial scope paths are unique per device among active records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum IntentScope {
    /// Whole-device intent.
    Full,
    /// Intent for one addressable sub-tree.
    Partial(ScopePath),
}

impl IntentScope {
    /// Returns the stable storage key for this scope.
    ///
    /// Full scopes use the literal `full`; partial scopes use `partial:` plus
    /// the canonical path rendering, so a partial path spelled `full` cannot
    /// collide with the full scope.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Full => "full".to_string(),
            Self::Partial(path) => format!("partial:{path}"),
        }
    }

    /// Returns the scope path for partial scopes.
    #[must_use]
    pub const fn path(&self) -> Option<&ScopePath> {
        match self {
            Self::Full => None,
            Self::Partial(path) => Some(path),
        }
    }
}

impl fmt::Display for IntentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Partial(path) => path.fmt(f),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
