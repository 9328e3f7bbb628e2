// crates/netdrift-dispatch/src/lib.rs
// ============================================================================
// Module: Netdrift Dispatch
// Description: Signed, at-least-once webhook delivery of drift events.
// Purpose: Fan drift events out to subscribed endpoints without ever blocking
//          detection on remote hosts.
// Dependencies: netdrift-core, hmac, rand, reqwest, serde, serde_json, sha2,
//               thiserror, tracing, url
// ============================================================================

//! ## Overview
//! The dispatcher turns persisted drift events into durable webhook
//! deliveries. Enqueueing only writes queue rows; a pool of blocking worker
//! threads pulls due deliveries, POSTs the signed payload, and records the
//! outcome. Failures retry with jittered exponential backoff until the
//! attempt budget is spent, then dead-letter; dead-lettered deliveries stay
//! queryable and support manual replay.
//!
//! Security posture: subscriber endpoints are untrusted; payloads are signed
//! with the per-subscription secret and redirects are never followed. See
//! `Docs/security/threat_model.md`.

pub mod dispatcher;
pub mod payload;
pub mod signature;
pub mod sink;

pub use dispatcher::DispatchConfig;
pub use dispatcher::DispatchError;
pub use dispatcher::Dispatcher;
pub use dispatcher::DispatcherHandle;
pub use payload::WebhookPayload;
pub use signature::idempotency_key;
pub use signature::sign_payload;
pub use sink::DeliveryRequest;
pub use sink::DeliverySink;
pub use sink::HttpSink;
pub use sink::SinkError;
