// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the strata client runtime.
//!
//! Every failure that crosses the public boundary is an [`ApiError`]: a
//! stable machine-readable [`ErrorKind`], an optional HTTP status, and a
//! human-readable message. Public operations return [`Response<T>`], never
//! panic across the boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias carried by every public client operation.
pub type Response<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Machine-readable, stable error kind.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The caller cancelled the operation.
    Cancelled,
    /// Malformed input, e.g. an empty HRN or a poll on a dead subscription.
    InvalidArgument,
    /// HTTP 401 from a backend after token refresh was already attempted.
    Unauthorized,
    /// HTTP 403 from a backend.
    Forbidden,
    /// HTTP 404 — catalog, layer, or partition does not exist.
    NotFound,
    /// HTTP 412 — version conflict on a batched write.
    PreconditionFailed,
    /// HTTP 5xx, a missing lookup entry, or an unparseable response body.
    ServiceUnavailable,
    /// Transport failure before any HTTP response was produced.
    NetworkError,
    /// The request exceeded its configured timeout.
    Timeout,
    /// The network facade has been torn down.
    Offline,
    /// Catch-all for errors that cannot be interpreted.
    Unknown,
}

impl ErrorKind {
    /// Stable `&'static str` representation (e.g. `"NOT_FOUND"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Offline => "OFFLINE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Map an HTTP status code to the error kind surfaced to callers.
    ///
    /// Statuses below 400 are not errors and map to [`ErrorKind::Unknown`];
    /// callers are expected to gate on success before converting.
    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            412 => Self::PreconditionFailed,
            400 => Self::InvalidArgument,
            408 => Self::Timeout,
            status if status >= 500 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` if an operation failing with this kind may be retried.
    ///
    /// Cancellation is never retryable; auth failures are handled by the
    /// dedicated refresh-and-retry path, not by the generic retry loop.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable | Self::NetworkError | Self::Timeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// The error type delivered to user callbacks and returned by every public
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("[{kind}] {message}")]
pub struct ApiError {
    /// Stable error kind.
    pub kind: ErrorKind,
    /// HTTP status that produced this error, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Human-readable description.
    pub message: String,
}

impl ApiError {
    /// Create an error with the given kind and message, no HTTP status.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            http_status: None,
            message: message.into(),
        }
    }

    /// Create an error from an HTTP status code and response body.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_http_status(status),
            http_status: Some(status),
            message: message.into(),
        }
    }

    /// Shorthand for the ubiquitous cancellation error.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Cancelled")
    }

    /// Shorthand for an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Shorthand for a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Returns `true` if the retry policy may re-issue the failed request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        if let Some(status) = self.http_status {
            // 429 carries kind Unknown but is explicitly retryable.
            if status == 429 {
                return true;
            }
        }
        self.kind.is_retryable()
    }
}
