// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP Archive capture decorator.
//!
//! Wraps an inner [`Network`], records every request/response pair, and
//! writes an HAR 1.2 document to the configured path when dropped. Timings
//! are partial when the inner transport does not expose them.

use crate::network::{Callbacks, Network};
use crate::request::NetworkRequest;
use crate::response::ResponseStatus;
use crate::types::{RequestId, SendOutcome};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Serialize)]
struct HarDocument {
    log: HarLog,
}

#[derive(Serialize)]
struct HarLog {
    version: &'static str,
    creator: HarCreator,
    entries: Vec<HarEntry>,
}

#[derive(Serialize)]
struct HarCreator {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HarHeader {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarRequest {
    method: String,
    url: String,
    http_version: &'static str,
    headers: Vec<HarHeader>,
    query_string: Vec<HarHeader>,
    headers_size: i64,
    body_size: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarContent {
    size: i64,
    mime_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarResponse {
    status: i64,
    status_text: String,
    http_version: &'static str,
    headers: Vec<HarHeader>,
    content: HarContent,
    #[serde(rename = "redirectURL")]
    redirect_url: String,
    headers_size: i64,
    body_size: i64,
}

#[derive(Serialize)]
struct HarTimings {
    send: i64,
    wait: i64,
    receive: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarEntry {
    started_date_time: String,
    time: f64,
    request: HarRequest,
    response: HarResponse,
    timings: HarTimings,
}

fn headers_of(list: &[(String, String)]) -> Vec<HarHeader> {
    list.iter()
        .map(|(name, value)| HarHeader {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

/// `Network` decorator emitting an HAR capture on destruction.
pub struct HarCaptureNetwork {
    inner: Arc<dyn Network>,
    entries: Arc<Mutex<Vec<HarEntry>>>,
    path: PathBuf,
}

impl HarCaptureNetwork {
    /// Wrap `inner`, writing the capture to `path` on drop.
    pub fn new(inner: Arc<dyn Network>, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            entries: Arc::new(Mutex::new(Vec::new())),
            path: path.into(),
        }
    }

    /// Number of captured entries so far.
    #[must_use]
    pub fn captured(&self) -> usize {
        self.entries.lock().expect("har lock poisoned").len()
    }
}

impl Network for HarCaptureNetwork {
    fn send(&self, request: NetworkRequest, callbacks: Callbacks) -> SendOutcome {
        let har_request = HarRequest {
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            http_version: "HTTP/1.1",
            headers: headers_of(&request.headers),
            query_string: Vec::new(),
            headers_size: -1,
            body_size: request.body.as_ref().map_or(0, |b| b.len() as i64),
        };
        let started_at = chrono::Utc::now();
        let clock = Instant::now();
        let entries = self.entries.clone();

        let Callbacks {
            on_headers,
            on_data,
            on_completion,
        } = callbacks;
        let wrapped = Callbacks {
            on_headers,
            on_data,
            on_completion: Box::new(move |response| {
                let elapsed_ms = clock.elapsed().as_secs_f64() * 1000.0;
                let (status, status_text) = match response.status {
                    ResponseStatus::Http(code) => (i64::from(code), String::new()),
                    ResponseStatus::Failed(err) => (0, err.to_string()),
                };
                let entry = HarEntry {
                    started_date_time: started_at.to_rfc3339(),
                    time: elapsed_ms,
                    request: har_request,
                    response: HarResponse {
                        status,
                        status_text,
                        http_version: "HTTP/1.1",
                        headers: headers_of(&response.headers),
                        content: HarContent {
                            size: response.bytes_downloaded as i64,
                            mime_type: response
                                .header("content-type")
                                .unwrap_or_default()
                                .to_string(),
                        },
                        redirect_url: String::new(),
                        headers_size: -1,
                        body_size: response.bytes_downloaded as i64,
                    },
                    // The inner transport does not expose phase timings.
                    timings: HarTimings {
                        send: -1,
                        wait: -1,
                        receive: -1,
                    },
                };
                entries.lock().expect("har lock poisoned").push(entry);
                on_completion(response);
            }),
        };
        self.inner.send(request, wrapped)
    }

    fn cancel(&self, id: RequestId) {
        self.inner.cancel(id);
    }
}

impl Drop for HarCaptureNetwork {
    fn drop(&mut self) {
        let entries = std::mem::take(&mut *self.entries.lock().expect("har lock poisoned"));
        let count = entries.len();
        let document = HarDocument {
            log: HarLog {
                version: "1.2",
                creator: HarCreator {
                    name: "strata-http",
                    version: env!("CARGO_PKG_VERSION"),
                },
                entries,
            },
        };
        match serde_json::to_vec_pretty(&document) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&self.path, json) {
                    warn!(target: "strata.http", path = %self.path.display(), %err, "failed to write HAR capture");
                } else {
                    info!(target: "strata.http", path = %self.path.display(), count, "HAR capture written");
                }
            }
            Err(err) => {
                warn!(target: "strata.http", %err, "failed to serialise HAR capture");
            }
        }
    }
}
