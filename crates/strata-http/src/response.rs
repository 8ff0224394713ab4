// SPDX-License-Identifier: MIT OR Apache-2.0
//! Response model delivered by the completion callback.

use crate::find_header;
use crate::types::{NetworkError, RequestId};

/// Final status of a request: an HTTP status line, or a transport error
/// when no response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// An HTTP response with this status code arrived.
    Http(u16),
    /// The transport failed or the request was cancelled.
    Failed(NetworkError),
}

impl ResponseStatus {
    /// The HTTP status code, when a response arrived.
    #[must_use]
    pub fn http(self) -> Option<u16> {
        match self {
            Self::Http(status) => Some(status),
            Self::Failed(_) => None,
        }
    }
}

/// The completion record for one request.
///
/// Exactly one of these is delivered per accepted send, after all header
/// and data callbacks.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    /// Id returned by `send` for this request.
    pub request_id: RequestId,
    /// Final status.
    pub status: ResponseStatus,
    /// Diagnostic detail accompanying a failure, empty on success.
    pub error: String,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Bytes received, including streamed data.
    pub bytes_downloaded: u64,
    /// Bytes sent, including the request body.
    pub bytes_uploaded: u64,
}

impl NetworkResponse {
    /// A completion carrying an HTTP status.
    #[must_use]
    pub fn http(request_id: RequestId, status: u16) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Http(status),
            error: String::new(),
            headers: Vec::new(),
            bytes_downloaded: 0,
            bytes_uploaded: 0,
        }
    }

    /// A completion synthesized for a transport failure.
    pub fn failed(request_id: RequestId, error: NetworkError, detail: impl Into<String>) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Failed(error),
            error: detail.into(),
            headers: Vec::new(),
            bytes_downloaded: 0,
            bytes_uploaded: 0,
        }
    }

    /// Returns `true` for HTTP 2xx.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        matches!(self.status, ResponseStatus::Http(s) if (200..300).contains(&s))
    }

    /// Returns `true` when the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == ResponseStatus::Failed(NetworkError::Cancelled)
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_success_range() {
        assert!(NetworkResponse::http(1, 200).is_successful());
        assert!(NetworkResponse::http(1, 204).is_successful());
        assert!(!NetworkResponse::http(1, 301).is_successful());
        assert!(!NetworkResponse::http(1, 404).is_successful());
    }

    #[test]
    fn failed_completion_carries_error() {
        let response = NetworkResponse::failed(7, NetworkError::Offline, "network is deinitialized");
        assert_eq!(response.status, ResponseStatus::Failed(NetworkError::Offline));
        assert_eq!(response.status.http(), None);
        assert_eq!(response.error, "network is deinitialized");
        assert!(!response.is_successful());
    }

    #[test]
    fn cancelled_detection() {
        assert!(NetworkResponse::failed(1, NetworkError::Cancelled, "cancelled").is_cancelled());
        assert!(!NetworkResponse::http(1, 200).is_cancelled());
    }
}
