// crates/netdrift-api/src/routes.rs
// ============================================================================
// Module: Route Handlers
// Description: JSON handlers for intent, snapshot, drift, webhook, and
//              delivery operations.
// Purpose: Validate inputs at the boundary and translate between HTTP and
//          the engine seams.
// Dependencies: axum, netdrift-core, netdrift-dispatch, serde, tokio
// ============================================================================

//! ## Overview
//! Every handler validates path and body inputs, runs the storage work on
//! the blocking pool (the store is synchronous), and returns engine records
//! as JSON. Subscription responses omit the shared secret; it is write-only
//! through this API.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use netdrift_core::DriftEvent;
use netdrift_core::EventType;
use netdrift_core::IntentRecord;
use netdrift_core::IntentScope;
use netdrift_core::ScopeFilter;
use netdrift_core::ScopePath;
use netdrift_core::WebhookDelivery;
use netdrift_core::WebhookSubscription;
use netdrift_core::core::identifiers::DeliveryId;
use netdrift_core::core::identifiers::DeviceId;
use netdrift_core::core::identifiers::SubscriptionId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Body of `PUT /intent/{device}/...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutIntentRequest {
    /// Raw intent content.
    pub content: Value,
    /// Optimistic-concurrency guard; the write only proceeds when it matches
    /// the current version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

/// Body of `POST /config-snapshot/{device}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRequest {
    /// Raw discovered configuration.
    pub content: Value,
}

/// Response of `POST /config-snapshot/{device}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    /// Drift events produced by this snapshot. Possibly empty.
    pub events: Vec<DriftEvent>,
    /// Intent scopes missing from the snapshot. Each also produced a
    /// whole-scope removal event.
    pub extraction_failures: Vec<String>,
    /// Events dropped for hash/diff inconsistency.
    pub invariant_violations: Vec<String>,
}

/// Body of `POST /webhooks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Endpoint URL, http or https.
    pub url: String,
    /// Shared signing secret. Never echoed back.
    pub secret: String,
    /// Scope filter; defaults to matching every scope.
    #[serde(default)]
    pub scope_filter: ScopeFilter,
    /// Event types to receive; empty means all.
    #[serde(default)]
    pub event_types: Vec<EventType>,
}

/// Subscription as rendered to API clients, without the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionView {
    /// Subscription identifier.
    pub subscription_id: SubscriptionId,
    /// Endpoint URL.
    pub url: String,
    /// Scope filter.
    pub scope_filter: ScopeFilter,
    /// Event types received.
    pub event_types: Vec<EventType>,
    /// Whether the subscription accepts new deliveries.
    pub active: bool,
}

impl From<WebhookSubscription> for SubscriptionView {
    fn from(subscription: WebhookSubscription) -> Self {
        Self {
            subscription_id: subscription.subscription_id,
            url: subscription.url,
            scope_filter: subscription.scope_filter,
            event_types: subscription.event_types,
            active: subscription.active,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs synchronous storage work on the blocking pool.
async fn run_blocking<T>(
    task: impl FnOnce() -> Result<T, ApiError> + Send + 'static,
) -> Result<T, ApiError>
where
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::internal(format!("blocking task failed: {err}")))?
}

/// Parses the device path segment.
fn device(raw: String) -> Result<DeviceId, ApiError> {
    DeviceId::parse(raw).map_err(ApiError::from)
}

/// Parses the scope path segment into a partial scope.
fn partial_scope(raw: &str) -> Result<IntentScope, ApiError> {
    Ok(IntentScope::Partial(ScopePath::parse(raw)?))
}

/// Writes an intent and renders 201 for the first version, 200 afterwards.
async fn put_intent(
    state: AppState,
    device_id: DeviceId,
    scope: IntentScope,
    body: PutIntentRequest,
) -> Result<(StatusCode, Json<IntentRecord>), ApiError> {
    let intents = Arc::clone(&state.intents);
    let record = run_blocking(move || {
        intents
            .put_intent(&device_id, &scope, &body.content, body.expected_version)
            .map_err(ApiError::from)
    })
    .await?;
    let status = if record.version == 1 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(record)))
}

/// Deletes an intent, rendering 204.
async fn delete_intent(
    state: AppState,
    device_id: DeviceId,
    scope: IntentScope,
) -> Result<StatusCode, ApiError> {
    let intents = Arc::clone(&state.intents);
    run_blocking(move || intents.delete_intent(&device_id, &scope).map_err(ApiError::from))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetches the full retained history of a `(device, scope)` pair.
async fn intent_history(
    state: AppState,
    device_id: DeviceId,
    scope: IntentScope,
) -> Result<Json<Vec<IntentRecord>>, ApiError> {
    let intents = Arc::clone(&state.intents);
    let history = run_blocking(move || {
        intents.intent_history(&device_id, &scope).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(history))
}

// ============================================================================
// SECTION: Intent Routes
// ============================================================================

/// `PUT /intent/{device}/full`
pub async fn put_full_intent(
    State(state): State<AppState>,
    Path(device_raw): Path<String>,
    Json(body): Json<PutIntentRequest>,
) -> Result<(StatusCode, Json<IntentRecord>), ApiError> {
    put_intent(state, device(device_raw)?, IntentScope::Full, body).await
}

/// `PUT /intent/{device}/partial/{scope}`
pub async fn put_partial_intent(
    State(state): State<AppState>,
    Path((device_raw, scope_raw)): Path<(String, String)>,
    Json(body): Json<PutIntentRequest>,
) -> Result<(StatusCode, Json<IntentRecord>), ApiError> {
    put_intent(state, device(device_raw)?, partial_scope(&scope_raw)?, body).await
}

/// `GET /intent/{device}`
pub async fn list_intents(
    State(state): State<AppState>,
    Path(device_raw): Path<String>,
) -> Result<Json<Vec<IntentRecord>>, ApiError> {
    let device_id = device(device_raw)?;
    let intents = Arc::clone(&state.intents);
    let records =
        run_blocking(move || intents.list_intents(&device_id).map_err(ApiError::from)).await?;
    Ok(Json(records))
}

/// `GET /intent/{device}/full/history`
pub async fn full_intent_history(
    State(state): State<AppState>,
    Path(device_raw): Path<String>,
) -> Result<Json<Vec<IntentRecord>>, ApiError> {
    intent_history(state, device(device_raw)?, IntentScope::Full).await
}

/// `GET /intent/{device}/partial/{scope}/history`
pub async fn partial_intent_history(
    State(state): State<AppState>,
    Path((device_raw, scope_raw)): Path<(String, String)>,
) -> Result<Json<Vec<IntentRecord>>, ApiError> {
    intent_history(state, device(device_raw)?, partial_scope(&scope_raw)?).await
}

/// `DELETE /intent/{device}/full`
pub async fn delete_full_intent(
    State(state): State<AppState>,
    Path(device_raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_intent(state, device(device_raw)?, IntentScope::Full).await
}

/// `DELETE /intent/{device}/partial/{scope}`
pub async fn delete_partial_intent(
    State(state): State<AppState>,
    Path((device_raw, scope_raw)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    delete_intent(state, device(device_raw)?, partial_scope(&scope_raw)?).await
}

// ============================================================================
// SECTION: Snapshot and Drift Routes
// ============================================================================

/// `POST /config-snapshot/{device}` — ingests a discovered configuration and
/// runs drift detection for every active intent of the device.
pub async fn ingest_snapshot(
    State(state): State<AppState>,
    Path(device_raw): Path<String>,
    Json(body): Json<SnapshotRequest>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let device_id = device(device_raw)?;
    let detector = Arc::clone(&state.detector);
    let outcome = run_blocking(move || {
        detector.process_snapshot(&device_id, &body.content).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(SnapshotResponse {
        events: outcome.events,
        extraction_failures: outcome
            .extraction_failures
            .iter()
            .map(ToString::to_string)
            .collect(),
        invariant_violations: outcome
            .invariant_violations
            .iter()
            .map(|violation| violation.reason.clone())
            .collect(),
    }))
}

/// `GET /drift/{device}` — all drift events for a device, newest first.
pub async fn drift_history(
    State(state): State<AppState>,
    Path(device_raw): Path<String>,
) -> Result<Json<Vec<DriftEvent>>, ApiError> {
    let device_id = device(device_raw)?;
    let events = Arc::clone(&state.events);
    let history =
        run_blocking(move || events.events_for_device(&device_id).map_err(ApiError::from))
            .await?;
    Ok(Json(history))
}

/// `GET /drift/{device}/full`
pub async fn full_drift_history(
    State(state): State<AppState>,
    Path(device_raw): Path<String>,
) -> Result<Json<Vec<DriftEvent>>, ApiError> {
    scoped_drift_history(state, device(device_raw)?, IntentScope::Full).await
}

/// `GET /drift/{device}/partial/{scope}`
pub async fn partial_drift_history(
    State(state): State<AppState>,
    Path((device_raw, scope_raw)): Path<(String, String)>,
) -> Result<Json<Vec<DriftEvent>>, ApiError> {
    scoped_drift_history(state, device(device_raw)?, partial_scope(&scope_raw)?).await
}

/// Fetches drift history for one scope.
async fn scoped_drift_history(
    state: AppState,
    device_id: DeviceId,
    scope: IntentScope,
) -> Result<Json<Vec<DriftEvent>>, ApiError> {
    let events = Arc::clone(&state.events);
    let history = run_blocking(move || {
        events.events_for_scope(&device_id, &scope).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(history))
}

// ============================================================================
// SECTION: Webhook and Delivery Routes
// ============================================================================

/// `POST /webhooks`
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionView>), ApiError> {
    let dispatcher = state.dispatcher.clone();
    let subscription = run_blocking(move || {
        dispatcher
            .subscribe(&body.url, &body.secret, body.scope_filter, body.event_types)
            .map_err(ApiError::from)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

/// `DELETE /webhooks/{id}`
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let subscription_id = SubscriptionId::parse(&id)?;
    let dispatcher = state.dispatcher.clone();
    run_blocking(move || dispatcher.unsubscribe(&subscription_id).map_err(ApiError::from))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /deliveries/{id}`
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WebhookDelivery>, ApiError> {
    let delivery_id = DeliveryId::parse(&id)?;
    let queue = Arc::clone(&state.queue);
    let delivery =
        run_blocking(move || queue.get_delivery(&delivery_id).map_err(ApiError::from)).await?;
    delivery.map(Json).ok_or_else(|| {
        ApiError::from(netdrift_core::StoreError::DeliveryNotFound {
            delivery_id: id,
        })
    })
}

/// `POST /deliveries/{id}/replay`
pub async fn replay_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WebhookDelivery>, ApiError> {
    let delivery_id = DeliveryId::parse(&id)?;
    let dispatcher = state.dispatcher.clone();
    let delivery =
        run_blocking(move || dispatcher.replay(&delivery_id).map_err(ApiError::from)).await?;
    Ok(Json(delivery))
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// `GET /healthz` — store readiness probe.
pub async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let intents = Arc::clone(&state.intents);
    run_blocking(move || intents.readiness().map_err(ApiError::from)).await?;
    Ok(Json(json!({"status": "ok"})))
}
