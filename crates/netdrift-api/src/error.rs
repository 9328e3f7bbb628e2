// crates/netdrift-api/src/error.rs
// ============================================================================
// Module: API Error Mapping
// Description: Translation of engine errors onto HTTP status codes.
// Purpose: Keep the status-code contract in one place so every route maps
//          identically.
// Dependencies: axum, netdrift-core, netdrift-dispatch, serde_json
// ============================================================================

//! ## Overview
//! [`ApiError`] is the single error type every handler returns. Engine
//! errors convert into it and carry their status: validation 400, not-found
//! 404, version conflict and non-replayable 409, canonicalization 422, and
//! storage or internal failures 500. Responses render as
//! `{"error": <code>, "message": <text>}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use netdrift_core::DetectorError;
use netdrift_core::StoreError;
use netdrift_core::ValidationError;
use netdrift_dispatch::DispatchError;
use serde_json::json;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// HTTP-mapped error returned by every route handler.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    status: StatusCode,
    /// Stable machine-readable error code.
    code: &'static str,
    /// Human-readable description.
    message: String,
}

impl ApiError {
    /// Builds an internal-error response, hiding no detail (the API is an
    /// operator surface, not a public one).
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }

    /// Returns the response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "validation",
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            StoreError::Canonicalization(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "canonicalization")
            }
            StoreError::IntentNotFound { .. } => (StatusCode::NOT_FOUND, "intent_not_found"),
            StoreError::SubscriptionNotFound { .. } => {
                (StatusCode::NOT_FOUND, "subscription_not_found")
            }
            StoreError::DeliveryNotFound { .. } => (StatusCode::NOT_FOUND, "delivery_not_found"),
            StoreError::VersionConflict { .. } => (StatusCode::CONFLICT, "version_conflict"),
            StoreError::NotReplayable { .. } => (StatusCode::CONFLICT, "not_replayable"),
            StoreError::Hashing(_) | StoreError::Io(_) | StoreError::Corrupt(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage")
            }
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Canonicalization(inner) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: "canonicalization",
                message: inner.to_string(),
            },
            DetectorError::Store(inner) => inner.into(),
            DetectorError::Hashing(_) | DetectorError::Diff(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(inner) => inner.into(),
            DispatchError::Store(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
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
    fn store_errors_map_to_documented_statuses() {
        let cases = [
            (
                StoreError::Validation(ValidationError::new("device_id", "empty")),
                StatusCode::BAD_REQUEST,
            ),
            (
                StoreError::IntentNotFound {
                    device_id: "r1".to_string(),
                    scope: "full".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::VersionConflict {
                    device_id: "r1".to_string(),
                    scope: "full".to_string(),
                    expected: 3,
                    actual: 5,
                },
                StatusCode::CONFLICT,
            ),
            (StoreError::Io("disk gone".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
