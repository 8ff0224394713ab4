// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signed sign-in request construction.
//!
//! The token endpoint authenticates clients with an OAuth 1.0-style
//! signature: an HMAC-SHA-256 over the canonical string
//! `POST&<encoded url>&<encoded sorted params>`, keyed by the encoded
//! secret, carried in the `Authorization: OAuth ...` header.

use crate::crypto::hmac_sha256;
use base64::Engine as _;

/// Platform access credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id (`oauth_consumer_key`).
    pub key: String,
    /// Access key secret; never leaves the process.
    pub secret: String,
}

impl Credentials {
    /// Create credentials from key and secret.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

/// RFC 3986 percent-encoding with the unreserved set only.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Build the `Authorization` header for a token request.
///
/// `timestamp` is epoch seconds and `nonce` a unique opaque string; both
/// are injectable so signatures are reproducible in tests.
#[must_use]
pub(crate) fn authorization_header(
    credentials: &Credentials,
    url: &str,
    timestamp: i64,
    nonce: &str,
) -> String {
    let timestamp = timestamp.to_string();
    // Sorted by parameter name, as the canonical form requires.
    let params: [(&str, &str); 5] = [
        ("oauth_consumer_key", credentials.key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA256"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_version", "1.0"),
    ];
    let param_string = params
        .iter()
        .map(|(name, value)| format!("{}={}", percent_encode(name), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    let base = format!(
        "POST&{}&{}",
        percent_encode(url),
        percent_encode(&param_string)
    );
    let signing_key = format!("{}&", percent_encode(&credentials.secret));
    let signature = base64::engine::general_purpose::STANDARD
        .encode(hmac_sha256(signing_key.as_bytes(), base.as_bytes()));

    format!(
        "OAuth oauth_consumer_key=\"{}\",oauth_nonce=\"{}\",oauth_signature_method=\"HMAC-SHA256\",oauth_timestamp=\"{}\",oauth_version=\"1.0\",oauth_signature=\"{}\"",
        percent_encode(&credentials.key),
        percent_encode(nonce),
        timestamp,
        percent_encode(&signature)
    )
}
