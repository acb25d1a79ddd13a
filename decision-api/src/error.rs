//! Error types for decision-api.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use decision_types::{DecisionId, ErrorResponse, WireError};

/// Failure of a request path.
///
/// Every variant aborts the request. Relay failures are reported separately
/// as [`RelayError`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bouncer identity could not be resolved.
    #[error("not allowed")]
    Auth,

    /// Malformed client input.
    #[error(transparent)]
    Validation(#[from] WireError),

    /// Storage collaborator failure.
    #[error("storage error: {0}")]
    Store(#[from] StorageError),

    /// Raw records could not be turned into wire decisions.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {reason}")]
    RateLimited {
        /// Reason for rate limiting.
        reason: String,
    },
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Store(StorageError::InvalidDecision { .. }) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Format(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = ErrorResponse {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Decision not found.
    #[error("decision not found: {id}")]
    NotFound {
        /// The decision that was not found.
        id: DecisionId,
    },

    /// A new decision violates a store invariant.
    #[error("invalid decision: {reason}")]
    InvalidDecision {
        /// Why the decision was rejected.
        reason: String,
    },

    /// A stored row could not be decoded.
    #[error("corrupt row: {reason}")]
    Corrupt {
        /// What failed to decode.
        reason: String,
    },
}

/// Formatter input errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A record lacks a field the wire format requires.
    #[error("malformed decision {id}: {reason}")]
    Malformed {
        /// Offending record.
        id: DecisionId,
        /// Missing or invalid field.
        reason: &'static str,
    },
}

/// Failure to hand deleted decisions to the upstream relay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Queue stayed full for the whole send timeout.
    #[error("relay queue full after {timeout_ms}ms")]
    Timeout {
        /// Configured send timeout.
        timeout_ms: u64,
    },

    /// The consumer side of the queue is gone.
    #[error("relay channel closed")]
    Closed,
}

/// Result type alias for request paths.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
