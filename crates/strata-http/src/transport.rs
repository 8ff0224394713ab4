// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference `Network` transport backed by reqwest.

use crate::network::{Callbacks, Network};
use crate::request::{Method, NetworkRequest, ProxySettings};
use crate::response::{NetworkResponse, ResponseStatus};
use crate::types::{NetworkError, RequestId, SendOutcome};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Construction settings for [`ReqwestNetwork`].
#[derive(Debug, Clone)]
pub struct ReqwestNetworkConfig {
    /// Maximum number of concurrently in-flight requests; a send beyond the
    /// limit is rejected synchronously with [`NetworkError::Overload`].
    pub max_inflight: usize,
    /// Proxy applied to every request. Per-request proxy overrides are not
    /// supported by this transport.
    pub proxy: Option<ProxySettings>,
}

impl Default for ReqwestNetworkConfig {
    fn default() -> Self {
        Self {
            max_inflight: 32,
            proxy: None,
        }
    }
}

struct Shared {
    inflight: Mutex<HashMap<RequestId, oneshot::Sender<NetworkError>>>,
    destroyed: AtomicBool,
}

impl Shared {
    fn abort(&self, id: RequestId, reason: NetworkError) {
        let handle = {
            let mut inflight = self.inflight.lock().expect("inflight lock poisoned");
            inflight.remove(&id)
        };
        if let Some(tx) = handle {
            let _ = tx.send(reason);
        }
    }
}

/// reqwest-backed [`Network`] implementation.
///
/// Dropping the transport synthesises completions with
/// [`NetworkError::Offline`] for every request still in flight.
pub struct ReqwestNetwork {
    client: reqwest::Client,
    next_id: AtomicU64,
    max_inflight: usize,
    shared: Arc<Shared>,
}

impl ReqwestNetwork {
    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidUrl`] when the configured proxy URL is
    /// unusable, [`NetworkError::Unknown`] when the underlying client
    /// cannot be constructed.
    pub fn new(config: ReqwestNetworkConfig) -> Result<Self, NetworkError> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &config.proxy {
            let mut p =
                reqwest::Proxy::all(proxy.url()).map_err(|_| NetworkError::InvalidUrl)?;
            if let (Some(user), Some(pass)) = (&proxy.user, &proxy.pass) {
                p = p.basic_auth(user, pass);
            }
            builder = builder.proxy(p);
        }
        let client = builder.build().map_err(|_| NetworkError::Unknown)?;
        Ok(Self {
            client,
            next_id: AtomicU64::new(1),
            max_inflight: config.max_inflight.max(1),
            shared: Arc::new(Shared {
                inflight: Mutex::new(HashMap::new()),
                destroyed: AtomicBool::new(false),
            }),
        })
    }

    fn build_request(&self, request: &NetworkRequest) -> Option<reqwest::RequestBuilder> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        };
        let url = url::Url::parse(&request.url).ok()?;
        let mut builder = self
            .client
            .request(method, url)
            .timeout(request.settings.transfer_timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Some(builder)
    }
}

fn classify(err: &reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout
    } else if err.is_connect() || err.is_body() || err.is_request() {
        NetworkError::Io
    } else {
        NetworkError::Unknown
    }
}

async fn drive(
    id: RequestId,
    builder: reqwest::RequestBuilder,
    uploaded: u64,
    on_headers: Option<crate::network::HeaderCallback>,
    on_data: Option<crate::network::DataCallback>,
) -> NetworkResponse {
    let mut response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            return NetworkResponse::failed(id, classify(&err), err.to_string());
        }
    };

    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    if let Some(on_headers) = &on_headers {
        on_headers(&headers);
    }

    let mut downloaded = 0u64;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                downloaded += chunk.len() as u64;
                if let Some(on_data) = &on_data {
                    on_data(&chunk);
                }
            }
            Ok(None) => break,
            Err(err) => {
                let mut failed = NetworkResponse::failed(id, classify(&err), err.to_string());
                failed.bytes_downloaded = downloaded;
                failed.bytes_uploaded = uploaded;
                return failed;
            }
        }
    }

    NetworkResponse {
        request_id: id,
        status: ResponseStatus::Http(status),
        error: String::new(),
        headers,
        bytes_downloaded: downloaded,
        bytes_uploaded: uploaded,
    }
}

impl Network for ReqwestNetwork {
    fn send(&self, request: NetworkRequest, callbacks: Callbacks) -> SendOutcome {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }
        let Some(builder) = self.build_request(&request) else {
            return Err(NetworkError::InvalidUrl);
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (abort_tx, abort_rx) = oneshot::channel::<NetworkError>();
        {
            let mut inflight = self.shared.inflight.lock().expect("inflight lock poisoned");
            if inflight.len() >= self.max_inflight {
                return Err(NetworkError::Overload);
            }
            inflight.insert(id, abort_tx);
        }

        let uploaded = request.body.as_ref().map_or(0, |b| b.len() as u64);
        let shared = self.shared.clone();
        let url = request.url.clone();
        let Callbacks {
            on_headers,
            on_data,
            on_completion,
        } = callbacks;
        tokio::spawn(async move {
            debug!(target: "strata.http", id, %url, "request dispatched");
            let drive_fut = drive(id, builder, uploaded, on_headers, on_data);
            tokio::pin!(drive_fut);
            let response = tokio::select! {
                response = &mut drive_fut => response,
                reason = abort_rx => {
                    let reason = reason.unwrap_or(NetworkError::Cancelled);
                    NetworkResponse::failed(id, reason, reason.to_string())
                }
            };
            // Completed requests must not be cancellable any more.
            shared
                .inflight
                .lock()
                .expect("inflight lock poisoned")
                .remove(&id);
            on_completion(response);
        });

        Ok(id)
    }

    fn cancel(&self, id: RequestId) {
        self.shared.abort(id, NetworkError::Cancelled);
    }
}

impl Drop for ReqwestNetwork {
    fn drop(&mut self) {
        self.shared.destroyed.store(true, Ordering::SeqCst);
        let handles: Vec<_> = {
            let mut inflight = self.shared.inflight.lock().expect("inflight lock poisoned");
            inflight.drain().collect()
        };
        if !handles.is_empty() {
            warn!(
                target: "strata.http",
                count = handles.len(),
                "network deinitialized with requests in flight"
            );
        }
        for (_, tx) in handles {
            let _ = tx.send(NetworkError::Offline);
        }
    }
}
