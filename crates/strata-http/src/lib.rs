// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP client facade for the strata client runtime.
//!
//! The [`Network`] capability is the only way the runtime touches the wire:
//! a request/streaming-callback contract with opaque request ids, a
//! reqwest-backed reference transport, and a HAR-capture decorator for
//! diagnostics.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancellable;
mod har;
mod network;
mod request;
mod response;
mod transport;
mod types;

pub use cancellable::send_cancellable;
pub use har::HarCaptureNetwork;
pub use network::{
    send_and_collect, Callbacks, CollectedResponse, CompletionCallback, DataCallback,
    HeaderCallback, Network,
};
pub use request::{Method, NetworkRequest, NetworkSettings, ProxySettings, ProxyType};
pub use response::{NetworkResponse, ResponseStatus};
pub use transport::{ReqwestNetwork, ReqwestNetworkConfig};
pub use types::{NetworkError, RequestId, SendOutcome};

/// Case-insensitive ASCII comparison used for header names.
#[must_use]
pub fn header_name_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Find a header value by case-insensitive name in an ordered header list.
#[must_use]
pub fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| header_name_eq(n, name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Request-Id".to_string(), "abc".to_string()),
        ];
        assert_eq!(find_header(&headers, "content-type"), Some("application/json"));
        assert_eq!(find_header(&headers, "X-REQUEST-ID"), Some("abc"));
        assert_eq!(find_header(&headers, "accept"), None);
    }
}
