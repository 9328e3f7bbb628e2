// crates/netdrift-dispatch/tests/dispatch.rs
// ============================================================================
// Module: Dispatch Integration Tests
// Description: End-to-end webhook delivery tests against a local HTTP server.
// Purpose: Verify signing, idempotency, retry backoff, dead-lettering, and
//          replay semantics against a real socket.
// ============================================================================

//! ## Overview
//! These tests wire a [`Dispatcher`] to an in-memory store and a `tiny_http`
//! server on an ephemeral port, then drive the full delivery lifecycle:
//! fan-out on notify, signed POSTs, retries on failure, dead-lettering at the
//! attempt budget, the unsubscribe cutoff, and manual replay.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU16;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use hmac::Hmac;
use hmac::Mac;
use netdrift_core::DeliveryQueue;
use netdrift_core::DeliveryStatus;
use netdrift_core::DriftEvent;
use netdrift_core::DriftEventLog;
use netdrift_core::DriftNotifier;
use netdrift_core::IntentScope;
use netdrift_core::MemoryStore;
use netdrift_core::ScopeFilter;
use netdrift_core::ScopePath;
use netdrift_core::SubscriptionRegistry;
use netdrift_core::Timestamp;
use netdrift_core::WebhookDelivery;
use netdrift_core::core::identifiers::DeviceId;
use netdrift_core::core::identifiers::EventId;
use netdrift_core::diff::DiffEntry;
use netdrift_core::diff::DiffPath;
use netdrift_core::hashing::DEFAULT_HASH_ALGORITHM;
use netdrift_core::hashing::hash_canonical_json;
use netdrift_dispatch::DispatchConfig;
use netdrift_dispatch::DispatchError;
use netdrift_dispatch::Dispatcher;
use netdrift_dispatch::HttpSink;
use netdrift_dispatch::WebhookPayload;
use netdrift_dispatch::idempotency_key;
use netdrift_dispatch::sign_payload;
use serde_json::json;
use sha2::Sha256;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// One request as observed by the local webhook endpoint.
#[derive(Debug, Clone)]
struct ReceivedRequest {
    signature: Option<String>,
    idempotency_key: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Local webhook endpoint recording every request it receives.
struct Endpoint {
    url: String,
    status: Arc<AtomicU16>,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl Endpoint {
    /// Starts a server on an ephemeral port answering with `status`.
    fn start(status: u16) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let status = Arc::new(AtomicU16::new(status));
        let received: Arc<Mutex<Vec<ReceivedRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let worker_status = Arc::clone(&status);
        let worker_received = Arc::clone(&received);
        thread::spawn(move || {
            while let Ok(mut request) = server.recv() {
                let mut body = Vec::new();
                let _ = request.as_reader().read_to_end(&mut body);
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv(name))
                        .map(|header| header.value.as_str().to_string())
                };
                worker_received.lock().unwrap().push(ReceivedRequest {
                    signature: header("x-netdrift-signature"),
                    idempotency_key: header("x-netdrift-idempotency-key"),
                    content_type: header("content-type"),
                    body,
                });
                let code = worker_status.load(Ordering::SeqCst);
                let _ = request.respond(Response::empty(code));
            }
        });

        Self {
            url: format!("http://{addr}/hook"),
            status,
            received,
        }
    }

    fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }
}

/// Fast retry configuration so tests settle in milliseconds.
fn fast_config(max_attempts: u32) -> DispatchConfig {
    DispatchConfig {
        workers: 2,
        max_attempts,
        base_backoff_ms: 1,
        max_backoff_ms: 4,
        request_timeout_ms: 2_000,
        poll_interval_ms: 5,
    }
}

/// Builds a dispatcher over one shared in-memory store.
fn dispatcher(store: &Arc<MemoryStore>, config: DispatchConfig) -> Dispatcher {
    let sink = HttpSink::new(Duration::from_millis(config.request_timeout_ms)).unwrap();
    Dispatcher::new(
        config,
        Arc::clone(store) as Arc<dyn SubscriptionRegistry>,
        Arc::clone(store) as Arc<dyn DriftEventLog>,
        Arc::clone(store) as Arc<dyn DeliveryQueue>,
        Arc::new(sink),
    )
    .unwrap()
}

/// Builds and persists a drift event for `edge-router-1`.
fn persisted_event(store: &Arc<MemoryStore>, scope: IntentScope) -> DriftEvent {
    let previous_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &json!({"mtu": 1500})).unwrap();
    let current_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &json!({"mtu": 9000})).unwrap();
    let event = DriftEvent {
        event_id: EventId::generate(),
        device_id: DeviceId::parse("edge-router-1").unwrap(),
        scope,
        previous_hash,
        current_hash,
        diff: vec![DiffEntry::changed(DiffPath::parse("mtu").unwrap(), json!(1500), json!(9000))],
        detected_at: Timestamp::now(),
    };
    store.append_event(&event).unwrap();
    event
}

/// Fetches the single delivery enqueued by the last notify.
fn sole_enqueued_delivery(store: &Arc<MemoryStore>) -> WebhookDelivery {
    let due = store.due_deliveries(Timestamp::now(), 16).unwrap();
    assert_eq!(due.len(), 1, "expected exactly one enqueued delivery");
    due.into_iter().next().unwrap()
}

/// Polls until `predicate` holds or the deadline expires.
fn wait_until(predicate: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not met within deadline");
}

/// Polls until the delivery reaches the given status, returning it.
fn wait_for_status(
    store: &Arc<MemoryStore>,
    delivery: &WebhookDelivery,
    status: DeliveryStatus,
) -> WebhookDelivery {
    wait_until(|| {
        store
            .get_delivery(&delivery.delivery_id)
            .unwrap()
            .is_some_and(|current| current.status == status)
    });
    store.get_delivery(&delivery.delivery_id).unwrap().unwrap()
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// The signature is `sha256=` plus 64 lowercase hex characters and verifies
/// against an independent HMAC computation.
#[test]
fn signature_verifies_independently() {
    let secret = "s3cret";
    let body = br#"{"event":"drift"}"#;
    let signature = sign_payload(secret, body);

    let hex = signature.strip_prefix("sha256=").expect("sha256= prefix");
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    let expected: String = mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect();
    assert_eq!(hex, expected);
}

/// The idempotency key is `<event_id>:<subscription_id>` and never varies.
#[test]
fn idempotency_key_is_event_and_subscription() {
    let event_id = EventId::generate();
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(3));
    let subscription = dispatcher
        .subscribe("https://example.com/hook", "secret", ScopeFilter::Any, Vec::new())
        .unwrap();

    let key = idempotency_key(&event_id, &subscription.subscription_id);
    assert_eq!(key, format!("{}:{}", event_id, subscription.subscription_id));
    assert_eq!(key, idempotency_key(&event_id, &subscription.subscription_id));
}

// ============================================================================
// SECTION: Successful Delivery
// ============================================================================

/// A matching subscription receives one signed POST whose body reproduces the
/// persisted event, and the delivery settles as succeeded.
#[test]
fn delivery_succeeds_with_signed_headers() {
    let endpoint = Endpoint::start(200);
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(3));
    let subscription = dispatcher
        .subscribe(&endpoint.url, "hook-secret", ScopeFilter::Any, Vec::new())
        .unwrap();

    let event = persisted_event(&store, IntentScope::Full);
    dispatcher.notify(&event).unwrap();
    let delivery = sole_enqueued_delivery(&store);

    let handle = dispatcher.start();
    let settled = wait_for_status(&store, &delivery, DeliveryStatus::Succeeded);
    handle.shutdown();

    assert_eq!(settled.attempt_count, 1);
    assert_eq!(settled.last_error, None);

    let requests = endpoint.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
    assert_eq!(
        request.signature.as_deref(),
        Some(sign_payload("hook-secret", &request.body).as_str())
    );
    assert_eq!(
        request.idempotency_key.as_deref(),
        Some(idempotency_key(&event.event_id, &subscription.subscription_id).as_str())
    );

    let payload: WebhookPayload = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(payload, WebhookPayload::from_event(&event));
}

/// Fan-out respects scope filters: a full-only subscription never sees
/// partial-scope events, while an any-scope subscription does.
#[test]
fn scope_filter_gates_fan_out() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(3));
    dispatcher
        .subscribe("https://example.com/full-only", "secret", ScopeFilter::Full, Vec::new())
        .unwrap();

    let scope = IntentScope::Partial(ScopePath::parse("bgp").unwrap());
    let event = persisted_event(&store, scope.clone());
    dispatcher.notify(&event).unwrap();
    assert!(store.due_deliveries(Timestamp::now(), 16).unwrap().is_empty());

    dispatcher
        .subscribe("https://example.com/any", "secret", ScopeFilter::Any, Vec::new())
        .unwrap();
    let second = persisted_event(&store, scope);
    dispatcher.notify(&second).unwrap();
    assert_eq!(store.due_deliveries(Timestamp::now(), 16).unwrap().len(), 1);
}

// ============================================================================
// SECTION: Retry and Dead-Letter
// ============================================================================

/// Persistent endpoint failures consume the attempt budget and dead-letter
/// the delivery, recording the last failure.
#[test]
fn failing_endpoint_dead_letters_at_attempt_budget() {
    let endpoint = Endpoint::start(500);
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(3));
    dispatcher.subscribe(&endpoint.url, "secret", ScopeFilter::Any, Vec::new()).unwrap();

    let event = persisted_event(&store, IntentScope::Full);
    dispatcher.notify(&event).unwrap();
    let delivery = sole_enqueued_delivery(&store);

    let handle = dispatcher.start();
    let settled = wait_for_status(&store, &delivery, DeliveryStatus::DeadLettered);
    handle.shutdown();

    assert_eq!(settled.attempt_count, 3);
    assert!(settled.last_error.as_deref().is_some_and(|err| err.contains("500")));
    assert_eq!(endpoint.request_count(), 3);

    // Dead-lettered deliveries are never offered again.
    assert!(store.due_deliveries(Timestamp::now(), 16).unwrap().is_empty());
}

/// Every retry reuses the same idempotency key, so receivers can deduplicate
/// at-least-once redelivery.
#[test]
fn retries_reuse_the_idempotency_key() {
    let endpoint = Endpoint::start(503);
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(3));
    let subscription =
        dispatcher.subscribe(&endpoint.url, "secret", ScopeFilter::Any, Vec::new()).unwrap();

    let event = persisted_event(&store, IntentScope::Full);
    dispatcher.notify(&event).unwrap();
    let delivery = sole_enqueued_delivery(&store);

    let handle = dispatcher.start();
    wait_for_status(&store, &delivery, DeliveryStatus::DeadLettered);
    handle.shutdown();

    let expected = idempotency_key(&event.event_id, &subscription.subscription_id);
    let requests = endpoint.requests();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(request.idempotency_key.as_deref(), Some(expected.as_str()));
    }
}

/// Unsubscribing cuts deliveries off before they reach the endpoint: pending
/// deliveries dead-letter with an inactive-subscription error and no request
/// is ever sent.
#[test]
fn unsubscribe_dead_letters_pending_deliveries() {
    let endpoint = Endpoint::start(200);
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(5));
    let subscription =
        dispatcher.subscribe(&endpoint.url, "secret", ScopeFilter::Any, Vec::new()).unwrap();

    let event = persisted_event(&store, IntentScope::Full);
    dispatcher.notify(&event).unwrap();
    let delivery = sole_enqueued_delivery(&store);

    dispatcher.unsubscribe(&subscription.subscription_id).unwrap();

    let handle = dispatcher.start();
    let settled = wait_for_status(&store, &delivery, DeliveryStatus::DeadLettered);
    handle.shutdown();

    assert_eq!(settled.last_error.as_deref(), Some("subscription inactive"));
    assert_eq!(endpoint.request_count(), 0);
}

// ============================================================================
// SECTION: Replay
// ============================================================================

/// Replaying a dead-lettered delivery keeps its attempt history and succeeds
/// once the endpoint recovers, delivering the originally persisted event.
#[test]
fn replay_preserves_attempt_history_and_redelivers() {
    let endpoint = Endpoint::start(500);
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(2));
    dispatcher.subscribe(&endpoint.url, "secret", ScopeFilter::Any, Vec::new()).unwrap();

    let event = persisted_event(&store, IntentScope::Full);
    dispatcher.notify(&event).unwrap();
    let delivery = sole_enqueued_delivery(&store);

    let handle = dispatcher.start();
    wait_for_status(&store, &delivery, DeliveryStatus::DeadLettered);

    endpoint.status.store(200, Ordering::SeqCst);
    let replayed = dispatcher.replay(&delivery.delivery_id).unwrap();
    assert_eq!(replayed.status, DeliveryStatus::Pending);
    assert_eq!(replayed.attempt_count, 2);

    let settled = wait_for_status(&store, &delivery, DeliveryStatus::Succeeded);
    handle.shutdown();

    assert_eq!(settled.attempt_count, 3);
    let requests = endpoint.requests();
    assert_eq!(requests.len(), 3);
    let payload: WebhookPayload = serde_json::from_slice(&requests[2].body).unwrap();
    assert_eq!(payload, WebhookPayload::from_event(&event));
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Subscribe rejects non-http(s) URLs and empty secrets without persisting
/// anything.
#[test]
fn subscribe_rejects_invalid_inputs() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(&store, fast_config(3));

    let ftp = dispatcher.subscribe("ftp://example.com/hook", "secret", ScopeFilter::Any, Vec::new());
    assert!(matches!(ftp, Err(DispatchError::Validation(_))), "{ftp:?}");

    let garbage = dispatcher.subscribe("not a url", "secret", ScopeFilter::Any, Vec::new());
    assert!(matches!(garbage, Err(DispatchError::Validation(_))), "{garbage:?}");

    let empty = dispatcher.subscribe("https://example.com/hook", "", ScopeFilter::Any, Vec::new());
    assert!(matches!(empty, Err(DispatchError::Validation(_))), "{empty:?}");

    assert!(store.active_subscriptions().unwrap().is_empty());
}

/// Zero workers and a backoff cap below the base are rejected at
/// construction.
#[test]
fn invalid_config_rejected() {
    let store = Arc::new(MemoryStore::new());
    let sink = HttpSink::new(Duration::from_secs(1)).unwrap();
    let config = DispatchConfig {
        workers: 0,
        ..DispatchConfig::default()
    };
    let result = Dispatcher::new(
        config,
        Arc::clone(&store) as Arc<dyn SubscriptionRegistry>,
        Arc::clone(&store) as Arc<dyn DriftEventLog>,
        Arc::clone(&store) as Arc<dyn DeliveryQueue>,
        Arc::new(sink),
    );
    assert!(matches!(result, Err(DispatchError::Validation(_))));

    let inverted = DispatchConfig {
        base_backoff_ms: 10_000,
        max_backoff_ms: 100,
        ..DispatchConfig::default()
    };
    assert!(inverted.validate().is_err());
}
