// crates/netdrift-api/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: TOML configuration loading and validation for the server
//              binary.
// Purpose: Give every deployment knob a default and reject nonsense before
//          anything is opened or bound.
// Dependencies: netdrift-core, netdrift-dispatch, netdrift-store-sqlite,
//               serde, thiserror, toml
// ============================================================================

//! ## Overview
//! [`ApiConfig`] is the on-disk shape of `netdrift.toml`: a `[server]` table
//! for the bind address and body cap, a `[store]` table for the SQLite
//! database, and a `[dispatch]` table for the webhook worker pool. Only the
//! store path is mandatory; everything else defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use netdrift_core::ValidationError;
use netdrift_dispatch::DispatchConfig;
use netdrift_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this shape.
    #[error("failed to parse config file '{path}': {message}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// A field value is out of range.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

// ============================================================================
// SECTION: Server Table
// ============================================================================

/// `[server]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Returns the default bind address (loopback only).
fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

/// Returns the default request body cap (1 MiB).
const fn default_max_body_bytes() -> usize {
    1_048_576
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Full `netdrift.toml` shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// SQLite store settings. The database path is the only mandatory field
    /// in the whole file.
    pub store: SqliteStoreConfig,
    /// Webhook dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl ApiConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is not valid
    /// TOML, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field values.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty bind address, a zero body
    /// cap, or invalid dispatcher settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.server.bind_addr.trim().is_empty() {
            return Err(ValidationError::new("server.bind_addr", "must not be empty"));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ValidationError::new(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }
        self.dispatch.validate()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::*;

    #[test]
    fn minimal_config_defaults_everything_but_the_store_path() {
        let config: ApiConfig = toml::from_str("[store]\npath = \"netdrift.db\"\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.server.max_body_bytes, 1_048_576);
        assert_eq!(config.dispatch.max_attempts, 10);
        assert_eq!(config.dispatch.base_backoff_ms, 1_000);
        assert_eq!(config.dispatch.max_backoff_ms, 300_000);
    }

    #[test]
    fn missing_store_path_is_a_parse_error() {
        let result = toml::from_str::<ApiConfig>("[server]\nbind_addr = \"0.0.0.0:80\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn zero_workers_rejected() {
        let config: ApiConfig =
            toml::from_str("[store]\npath = \"x.db\"\n[dispatch]\nworkers = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "dispatch.workers");
    }

    #[test]
    fn empty_bind_addr_rejected() {
        let config: ApiConfig =
            toml::from_str("[store]\npath = \"x.db\"\n[server]\nbind_addr = \" \"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "server.bind_addr");
    }
}
