// crates/netdrift-api/src/lib.rs
// ============================================================================
// Module: Netdrift API
// Description: HTTP surface over the intent store, drift detector, and
//              webhook dispatcher.
// Purpose: Expose intent, snapshot, drift, and webhook operations as JSON
//          routes backed by the durable SQLite store.
// Dependencies: axum, netdrift-core, netdrift-dispatch, netdrift-store-sqlite,
//               serde, thiserror, tokio, toml, tracing
// ============================================================================

//! ## Overview
//! This crate wires the netdrift engine together: it loads TOML
//! configuration, opens the SQLite store, starts the webhook dispatcher, and
//! serves the HTTP routes. Storage errors map onto stable status codes:
//! validation 400, not-found 404, version conflict 409, canonicalization 422,
//! everything else 500.
//!
//! Security posture: request bodies are untrusted and size-capped; device
//! ids and scope paths are validated before touching storage. See
//! `Docs/security/threat_model.md`.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ApiConfig;
pub use config::ConfigError;
pub use config::ServerConfig;
pub use error::ApiError;
pub use server::ServerError;
pub use server::build_state;
pub use server::router;
pub use state::AppState;
