// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Network` capability consumed by the client runtime.

use crate::request::NetworkRequest;
use crate::response::NetworkResponse;
use crate::types::{RequestId, SendOutcome};
use bytes::{Bytes, BytesMut};
use std::sync::{Arc, Mutex};

/// Header callback: invoked with the full header list once available.
pub type HeaderCallback = Box<dyn Fn(&[(String, String)]) + Send + Sync>;
/// Data callback: invoked zero or more times with payload chunks.
pub type DataCallback = Box<dyn Fn(&[u8]) + Send + Sync>;
/// Completion callback: invoked exactly once per accepted send.
pub type CompletionCallback = Box<dyn FnOnce(NetworkResponse) + Send>;

/// Streaming callbacks attached to one request.
///
/// Per accepted request the transport fires the header callback at most
/// once, the data callback zero or more times, and the completion callback
/// exactly once — strictly last, from a single task per request.
pub struct Callbacks {
    /// Optional header callback.
    pub on_headers: Option<HeaderCallback>,
    /// Optional data callback.
    pub on_data: Option<DataCallback>,
    /// Mandatory completion callback.
    pub on_completion: CompletionCallback,
}

impl Callbacks {
    /// Callbacks that only observe completion.
    pub fn completion_only(on_completion: impl FnOnce(NetworkResponse) + Send + 'static) -> Self {
        Self {
            on_headers: None,
            on_data: None,
            on_completion: Box::new(on_completion),
        }
    }
}

/// The transport capability.
///
/// Implementations must be thread-safe: concurrent sends yield distinct
/// request ids, and `cancel` is best-effort — if the request already
/// completed it is a no-op, otherwise the completion callback still fires
/// with a cancelled status.
pub trait Network: Send + Sync {
    /// Push a request into the transport.
    ///
    /// On `Ok(id)`, exactly one completion callback fires eventually with
    /// the same id. On `Err`, no callback will fire for this request.
    fn send(&self, request: NetworkRequest, callbacks: Callbacks) -> SendOutcome;

    /// Best-effort cancellation of an in-flight request.
    fn cancel(&self, id: RequestId);
}

/// A fully-buffered response: the completion record plus assembled body.
#[derive(Debug, Clone)]
pub struct CollectedResponse {
    /// The completion record.
    pub response: NetworkResponse,
    /// Body bytes assembled from the data callbacks.
    pub body: Bytes,
}

/// Issue a request and buffer the whole response body.
///
/// Returns the transport send error immediately when the request was not
/// accepted; otherwise resolves once the completion callback fires. The
/// returned request id is reported through the `on_send` hook before any
/// callback can fire, so callers may register it for cancellation.
pub async fn send_and_collect(
    network: &dyn Network,
    request: NetworkRequest,
    on_send: impl FnOnce(RequestId),
) -> Result<CollectedResponse, crate::NetworkError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let body = Arc::new(Mutex::new(BytesMut::new()));
    let chunks = body.clone();
    let callbacks = Callbacks {
        on_headers: None,
        on_data: Some(Box::new(move |chunk| {
            chunks.lock().expect("body lock poisoned").extend_from_slice(chunk);
        })),
        on_completion: Box::new(move |response| {
            let _ = tx.send(response);
        }),
    };
    let id = network.send(request, callbacks)?;
    on_send(id);
    let response = rx.await.map_err(|_| crate::NetworkError::Unknown)?;
    let body = body.lock().expect("body lock poisoned").split().freeze();
    Ok(CollectedResponse { response, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NetworkError;

    /// A transport double that serves canned bodies synchronously.
    struct CannedNetwork {
        body: Vec<u8>,
        status: u16,
    }

    impl Network for CannedNetwork {
        fn send(&self, _request: NetworkRequest, callbacks: Callbacks) -> SendOutcome {
            if let Some(on_headers) = &callbacks.on_headers {
                on_headers(&[("content-type".into(), "text/plain".into())]);
            }
            if let Some(on_data) = &callbacks.on_data {
                for chunk in self.body.chunks(3) {
                    on_data(chunk);
                }
            }
            (callbacks.on_completion)(NetworkResponse::http(1, self.status));
            Ok(1)
        }

        fn cancel(&self, _id: RequestId) {}
    }

    #[tokio::test]
    async fn collects_chunked_body() {
        let network = CannedNetwork {
            body: b"SomeData".to_vec(),
            status: 200,
        };
        let collected = send_and_collect(&network, NetworkRequest::new("http://x"), |_| {})
            .await
            .unwrap();
        assert_eq!(collected.body.as_ref(), b"SomeData");
        assert!(collected.response.is_successful());
    }

    #[tokio::test]
    async fn reports_request_id_before_completion() {
        let network = CannedNetwork {
            body: Vec::new(),
            status: 204,
        };
        let mut seen = None;
        let collected = send_and_collect(&network, NetworkRequest::new("http://x"), |id| {
            seen = Some(id);
        })
        .await
        .unwrap();
        assert_eq!(seen, Some(1));
        assert_eq!(collected.response.request_id, 1);
    }

    struct RejectingNetwork;

    impl Network for RejectingNetwork {
        fn send(&self, _request: NetworkRequest, _callbacks: Callbacks) -> SendOutcome {
            Err(NetworkError::Overload)
        }

        fn cancel(&self, _id: RequestId) {}
    }

    #[tokio::test]
    async fn rejected_send_surfaces_error() {
        let err = send_and_collect(&RejectingNetwork, NetworkRequest::new("http://x"), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::Overload);
    }
}
