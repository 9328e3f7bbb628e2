// crates/netdrift-dispatch/src/sink.rs
// ============================================================================
// Module: Delivery Sink
// Description: The HTTP boundary where webhook payloads leave the process.
// Purpose: Isolate the network so the dispatcher core stays testable.
// Dependencies: netdrift-core, reqwest, thiserror
// ============================================================================

//! ## Overview
//! [`DeliverySink`] is the seam between the dispatcher's retry machinery and
//! the network. [`HttpSink`] is the production implementation: a blocking
//! `reqwest` client with a hard timeout and redirects disabled, so a
//! malicious endpoint cannot bounce signed payloads to another host.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::signature::IDEMPOTENCY_HEADER;
use crate::signature::SIGNATURE_HEADER;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A single delivery attempt failure.
///
/// Both variants are retryable; the dispatcher decides when to stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The endpoint answered with a non-success status.
    #[error("endpoint answered {status}")]
    Status {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },
    /// The request never completed (connect, timeout, TLS, ...).
    #[error("transport failure: {0}")]
    Transport(String),
    /// The client could not be constructed or the request was malformed.
    #[error("request build failure: {0}")]
    Build(String),
}

// ============================================================================
// SECTION: Sink Seam
// ============================================================================

/// One webhook POST, fully prepared.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Endpoint URL.
    pub url: String,
    /// Exact body bytes.
    pub body: Vec<u8>,
    /// `x-netdrift-signature` header value.
    pub signature: String,
    /// `x-netdrift-idempotency-key` header value.
    pub idempotency_key: String,
}

/// Sends prepared webhook requests.
pub trait DeliverySink: Send + Sync {
    /// Performs one delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] on any non-2xx response or transport failure.
    fn deliver(&self, request: &DeliveryRequest) -> Result<(), SinkError>;
}

// ============================================================================
// SECTION: HTTP Sink
// ============================================================================

/// Blocking HTTP implementation of [`DeliverySink`].
pub struct HttpSink {
    /// Shared blocking client with timeout and redirects disabled.
    client: Client,
}

impl HttpSink {
    /// Builds the sink with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Build`] when the TLS backend fails to initialize.
    pub fn new(request_timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("netdrift/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .build()
            .map_err(|err| SinkError::Build(err.to_string()))?;
        Ok(Self {
            client,
        })
    }
}

impl DeliverySink for HttpSink {
    fn deliver(&self, request: &DeliveryRequest) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&request.url)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, &request.signature)
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key)
            .body(request.body.clone())
            .send()
            .map_err(|err| SinkError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
