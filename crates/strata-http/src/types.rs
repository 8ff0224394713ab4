// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transport-level identifiers and error codes.

/// A unique request id assigned by the transport when `send` succeeds.
///
/// Ids are opaque, process-local, and never zero.
pub type RequestId = u64;

/// Transport error codes shared by [`send`](crate::Network::send) outcomes
/// and synthesized completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum NetworkError {
    /// I/O failure while connecting or transferring.
    #[error("i/o error")]
    Io,
    /// Proxy or gateway refused authorization.
    #[error("authorization error")]
    Authorization,
    /// The request URL could not be parsed.
    #[error("invalid URL")]
    InvalidUrl,
    /// The transport has been torn down.
    #[error("offline: network is deinitialized")]
    Offline,
    /// The request was cancelled before completion.
    #[error("cancelled")]
    Cancelled,
    /// TLS or authentication handshake failure.
    #[error("authentication error")]
    Authentication,
    /// The timeout interval expired before the request completed.
    #[error("timed out")]
    Timeout,
    /// The transport's in-flight request limit was reached.
    #[error("network overload")]
    Overload,
    /// Internal error that cannot be interpreted.
    #[error("unknown network error")]
    Unknown,
}

/// Outcome of pushing a request into the transport: a request id on
/// success, or the error code that prevented the send.
pub type SendOutcome = Result<RequestId, NetworkError>;

impl From<NetworkError> for strata_error::ApiError {
    fn from(err: NetworkError) -> Self {
        use strata_error::ErrorKind;
        let kind = match err {
            NetworkError::Cancelled => ErrorKind::Cancelled,
            NetworkError::Timeout => ErrorKind::Timeout,
            NetworkError::Offline => ErrorKind::Offline,
            NetworkError::InvalidUrl => ErrorKind::InvalidArgument,
            NetworkError::Authorization | NetworkError::Authentication => ErrorKind::Unauthorized,
            NetworkError::Io | NetworkError::Overload => ErrorKind::NetworkError,
            NetworkError::Unknown => ErrorKind::Unknown,
        };
        strata_error::ApiError::new(kind, err.to_string())
    }
}
