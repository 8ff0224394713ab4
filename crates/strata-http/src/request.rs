// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request model and per-request transport settings.

use crate::find_header;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP verb of a [`NetworkRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// HTTP GET.
    #[default]
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
    /// HTTP PATCH.
    Patch,
    /// HTTP HEAD.
    Head,
    /// HTTP OPTIONS.
    Options,
}

impl Method {
    /// Canonical verb string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// Proxy protocol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    /// Plain HTTP proxy.
    Http,
    /// HTTPS proxy.
    Https,
    /// SOCKS4 proxy.
    Socks4,
    /// SOCKS5 proxy.
    Socks5,
}

/// Proxy configuration applied to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy protocol.
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
    /// Proxy host name.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Optional user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Optional password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
}

impl ProxySettings {
    /// Render the proxy URL scheme://host:port.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = match self.proxy_type {
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::Socks4 => "socks4",
            ProxyType::Socks5 => "socks5",
        };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Per-request transport settings.
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    /// Time allowed to establish a connection.
    pub connection_timeout: Duration,
    /// Time allowed for the whole transfer.
    pub transfer_timeout: Duration,
    /// Proxy override. `None` uses the transport default.
    pub proxy: Option<ProxySettings>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(60),
            transfer_timeout: Duration::from_secs(30),
            proxy: None,
        }
    }
}

/// One outbound HTTP request.
///
/// Headers keep insertion order; lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct NetworkRequest {
    /// Absolute request URL.
    pub url: String,
    /// HTTP verb.
    pub method: Method,
    /// Ordered header list.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Bytes>,
    /// Transport settings for this request.
    pub settings: NetworkSettings,
}

impl NetworkRequest {
    /// Create a GET request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the HTTP verb.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Append a header, keeping insertion order.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the transport settings.
    #[must_use]
    pub fn with_settings(mut self, settings: NetworkSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}
