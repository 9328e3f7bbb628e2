// crates/netdrift-dispatch/src/signature.rs
// ============================================================================
// Module: Webhook Payload Signing
// Description: HMAC-SHA256 signatures and idempotency keys for deliveries.
// Purpose: Let subscribers authenticate payloads and deduplicate retries.
// Dependencies: hmac, sha2
// ============================================================================

//! ## Overview
//! Every delivery attempt carries two headers derived here:
//! `x-netdrift-signature` is an HMAC-SHA256 over the exact body bytes, keyed
//! by the subscription secret; `x-netdrift-idempotency-key` is stable across
//! every retry of one `(event, subscription)` delivery so receivers can
//! deduplicate at-least-once redelivery.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use netdrift_core::core::identifiers::EventId;
use netdrift_core::core::identifiers::SubscriptionId;
use sha2::Sha256;

/// HMAC-SHA256 keyed by the subscription secret.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-netdrift-signature";
/// Header carrying the delivery idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "x-netdrift-idempotency-key";

/// Signs body bytes with the subscription secret.
///
/// Returns `sha256=<lowercase hmac hex>`, computed over the bytes exactly as
/// sent on the wire.
#[must_use]
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    #[allow(clippy::expect_used, reason = "HMAC-SHA256 accepts keys of any length.")]
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let mut rendered = String::with_capacity(7 + digest.len() * 2);
    rendered.push_str("sha256=");
    for byte in digest {
        rendered.push_str(&format!("{byte:02x}"));
    }
    rendered
}

/// Builds the idempotency key for one `(event, subscription)` delivery.
///
/// The key never changes across retries or manual replays of the delivery.
#[must_use]
pub fn idempotency_key(event_id: &EventId, subscription_id: &SubscriptionId) -> String {
    format!("{event_id}:{subscription_id}")
}
