// crates/netdrift-api/src/server.rs
// ============================================================================
// Module: Server Assembly
// Description: Router construction and engine wiring over the SQLite store.
// Purpose: Build the whole running system from one validated config.
// Dependencies: axum, netdrift-core, netdrift-dispatch, netdrift-store-sqlite,
//               thiserror
// ============================================================================

//! ## Overview
//! [`build_state`] opens the SQLite store, constructs the dispatcher (which
//! doubles as the detector's notifier) and starts its worker pool, then
//! bundles everything into [`AppState`]. [`router`] maps the route table onto
//! the handlers in [`crate::routes`] with the configured body cap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use netdrift_core::DeliveryQueue;
use netdrift_core::DriftDetector;
use netdrift_core::DriftEventLog;
use netdrift_core::DriftNotifier;
use netdrift_core::IntentStore;
use netdrift_core::SnapshotStore;
use netdrift_core::SubscriptionRegistry;
use netdrift_dispatch::DispatchError;
use netdrift_dispatch::Dispatcher;
use netdrift_dispatch::DispatcherHandle;
use netdrift_dispatch::HttpSink;
use netdrift_dispatch::SinkError;
use netdrift_store_sqlite::SqliteStore;
use netdrift_store_sqlite::SqliteStoreError;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::config::ConfigError;
use crate::routes;
use crate::state::AppState;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server startup failure.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The SQLite store could not be opened.
    #[error(transparent)]
    Store(#[from] SqliteStoreError),
    /// The dispatcher rejected its configuration.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The HTTP sink could not be constructed.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Binding or serving the listener failed.
    #[error("listener failure: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Opens the store, starts the dispatcher workers, and builds the shared
/// state.
///
/// The returned [`DispatcherHandle`] owns the worker pool; shut it down after
/// the HTTP server stops so queued deliveries settle.
///
/// # Errors
///
/// Returns [`ServerError`] when the store cannot be opened or the dispatcher
/// configuration is invalid.
pub fn build_state(config: &ApiConfig) -> Result<(AppState, DispatcherHandle), ServerError> {
    let store = Arc::new(SqliteStore::open(&config.store)?);
    let sink = HttpSink::new(Duration::from_millis(config.dispatch.request_timeout_ms))?;
    let dispatcher = Dispatcher::new(
        config.dispatch.clone(),
        Arc::clone(&store) as Arc<dyn SubscriptionRegistry>,
        Arc::clone(&store) as Arc<dyn DriftEventLog>,
        Arc::clone(&store) as Arc<dyn DeliveryQueue>,
        Arc::new(sink),
    )?;
    let handle = dispatcher.start();
    let detector = Arc::new(DriftDetector::new(
        Arc::clone(&store) as Arc<dyn IntentStore>,
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
        Arc::clone(&store) as Arc<dyn DriftEventLog>,
        Arc::new(dispatcher.clone()) as Arc<dyn DriftNotifier>,
    ));
    let state = AppState {
        intents: Arc::clone(&store) as Arc<dyn IntentStore>,
        events: Arc::clone(&store) as Arc<dyn DriftEventLog>,
        queue: store as Arc<dyn DeliveryQueue>,
        detector,
        dispatcher,
    };
    Ok((state, handle))
}

/// Builds the route table.
#[must_use]
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/intent/{device}", get(routes::list_intents))
        .route(
            "/intent/{device}/full",
            put(routes::put_full_intent).delete(routes::delete_full_intent),
        )
        .route("/intent/{device}/full/history", get(routes::full_intent_history))
        .route(
            "/intent/{device}/partial/{scope}",
            put(routes::put_partial_intent).delete(routes::delete_partial_intent),
        )
        .route(
            "/intent/{device}/partial/{scope}/history",
            get(routes::partial_intent_history),
        )
        .route("/config-snapshot/{device}", post(routes::ingest_snapshot))
        .route("/drift/{device}", get(routes::drift_history))
        .route("/drift/{device}/full", get(routes::full_drift_history))
        .route("/drift/{device}/partial/{scope}", get(routes::partial_drift_history))
        .route("/webhooks", post(routes::create_subscription))
        .route("/webhooks/{id}", delete(routes::delete_subscription))
        .route("/deliveries/{id}", get(routes::get_delivery))
        .route("/deliveries/{id}/replay", post(routes::replay_delivery))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
