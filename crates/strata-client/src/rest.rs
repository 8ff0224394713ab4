// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authenticated REST dispatch with retry and backoff.
//!
//! [`RestClient`] composes URL, query, headers, and body into a
//! [`NetworkRequest`], attaches a bearer token from the provider, and
//! drives the retry policy: transient transport failures, HTTP 5xx, and
//! 429 back off and retry; a 401 triggers one implicit token refresh before
//! it is surfaced as `Unauthorized`; cancellation never retries.

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use strata_auth::TokenProvider;
use strata_error::{ApiError, ErrorKind, Response};
use strata_http::{
    send_cancellable, Method, Network, NetworkError, NetworkRequest, NetworkSettings,
    ResponseStatus,
};
use strata_task::CancellationContext;
use tracing::{debug, warn};

/// Retry tuning for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial one; 0 disables retries.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub initial_backoff: Duration,
    /// Cap applied to the computed delay.
    pub max_backoff: Duration,
    /// Jitter factor in `[0.0, 1.0]`; the delay is reduced by up to this
    /// fraction.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            jitter_factor: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (zero-indexed).
    #[must_use]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_backoff.as_millis() as u64).saturating_mul(exp);
        let capped_ms = delay_ms.min(self.max_backoff.as_millis() as u64);

        let jitter_factor = self.jitter_factor.clamp(0.0, 1.0);
        if jitter_factor > 0.0 && capped_ms > 0 {
            let jitter_range = (capped_ms as f64 * jitter_factor) as u64;
            // Cheap pseudo-random: system-clock nanos mixed with the attempt.
            let nanos = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos() as u64;
            let pseudo = nanos.wrapping_mul(u64::from(attempt) + 1);
            let jitter = if jitter_range > 0 {
                pseudo % jitter_range
            } else {
                0
            };
            Duration::from_millis(capped_ms.saturating_sub(jitter))
        } else {
            Duration::from_millis(capped_ms)
        }
    }
}

/// A fully-buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    /// Returns `true` for HTTP 2xx.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON, surfacing parse failures as
    /// `ServiceUnavailable` with a diagnostic.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Response<T> {
        serde_json::from_slice(&self.body).map_err(|err| {
            warn!(target: "strata.client", %err, "response body failed to parse");
            ApiError::service_unavailable(format!("unparseable response body: {err}"))
        })
    }
}

/// Compose an absolute URL from a base, path segments, and query pairs.
///
/// Segments and query values are percent-encoded; the base URL's own path
/// is preserved.
pub(crate) fn build_url(
    base: &str,
    segments: &[&str],
    query: &[(&str, &str)],
) -> Response<String> {
    let mut url = url::Url::parse(base)
        .map_err(|err| ApiError::invalid_argument(format!("invalid base URL `{base}`: {err}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| ApiError::invalid_argument(format!("base URL `{base}` cannot be a base")))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url.into())
}

/// Authenticated, retrying request dispatcher.
#[derive(Clone)]
pub struct RestClient {
    network: Arc<dyn Network>,
    token_provider: Option<Arc<TokenProvider>>,
    retry: RetryPolicy,
    network_settings: NetworkSettings,
}

impl RestClient {
    /// Create a dispatcher.
    pub fn new(
        network: Arc<dyn Network>,
        token_provider: Option<Arc<TokenProvider>>,
        retry: RetryPolicy,
        network_settings: NetworkSettings,
    ) -> Self {
        Self {
            network,
            token_provider,
            retry,
            network_settings,
        }
    }

    /// Issue `method` against `url` with an optional JSON body.
    ///
    /// Retries transient failures per the policy; refreshes the bearer
    /// token once on the first 401.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        context: &CancellationContext,
    ) -> Response<HttpResponse> {
        self.call_with_headers(method, url, body, &[], context).await
    }

    /// [`call`](Self::call) with additional request headers.
    pub async fn call_with_headers(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        extra_headers: &[(String, String)],
        context: &CancellationContext,
    ) -> Response<HttpResponse> {
        let mut refreshed = false;
        let mut attempt: u32 = 0;
        loop {
            if context.is_cancelled() {
                return Err(ApiError::cancelled());
            }

            let mut request = NetworkRequest::new(url)
                .with_method(method)
                .with_settings(self.network_settings.clone());
            if let Some(provider) = &self.token_provider {
                let token = provider.token(context).await?;
                request = request
                    .with_header("Authorization", format!("Bearer {}", token.access_token));
            }
            for (name, value) in extra_headers {
                request = request.with_header(name.clone(), value.clone());
            }
            if let Some(body) = &body {
                request = request
                    .with_header("Content-Type", "application/json")
                    .with_body(body.clone());
            }

            match send_cancellable(self.network.clone(), request, context).await {
                Err(NetworkError::Cancelled) => return Err(ApiError::cancelled()),
                Err(err) => {
                    let api_err: ApiError = err.into();
                    if api_err.is_retryable() && attempt < self.retry.max_retries {
                        let delay = self.retry.compute_delay(attempt);
                        warn!(
                            target: "strata.client",
                            %err,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transport failure, backing off"
                        );
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(api_err);
                }
                Ok(collected) => {
                    let status = match collected.response.status {
                        ResponseStatus::Http(status) => status,
                        ResponseStatus::Failed(code) => {
                            let api_err: ApiError = code.into();
                            if api_err.kind == ErrorKind::Cancelled {
                                return Err(api_err);
                            }
                            if api_err.is_retryable() && attempt < self.retry.max_retries {
                                let delay = self.retry.compute_delay(attempt);
                                attempt += 1;
                                tokio::time::sleep(delay).await;
                                continue;
                            }
                            return Err(api_err);
                        }
                    };

                    if (200..300).contains(&status) {
                        return Ok(HttpResponse {
                            status,
                            body: collected.body,
                            headers: collected.response.headers,
                        });
                    }

                    if status == 401 && !refreshed {
                        if let Some(provider) = &self.token_provider {
                            debug!(
                                target: "strata.client",
                                "401 with presumed-valid token, refreshing once"
                            );
                            provider.invalidate();
                            refreshed = true;
                            continue;
                        }
                    }

                    let err = ApiError::from_status(
                        status,
                        String::from_utf8_lossy(&collected.body).into_owned(),
                    );
                    if err.is_retryable() && attempt < self.retry.max_retries {
                        let delay = self.retry.compute_delay(attempt);
                        warn!(
                            target: "strata.client",
                            status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retryable status, backing off"
                        );
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Convenience GET returning the parsed JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        context: &CancellationContext,
    ) -> Response<T> {
        self.call(Method::Get, url, None, context).await?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_composition_encodes_segments() {
        let url = build_url(
            "https://query.example.com/query/v1",
            &["catalogs", "hrn:here:data:::cat", "layers", "test layer"],
            &[("partition", "269"), ("version", "4")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://query.example.com/query/v1/catalogs/hrn:here:data:::cat/layers/test%20layer?partition=269&version=4"
        );
    }

    #[test]
    fn url_composition_without_query() {
        let url = build_url("https://blob.example.com/blob/v1/", &["data", "h-1"], &[]).unwrap();
        assert_eq!(url, "https://blob.example.com/blob/v1/data/h-1");
    }

    #[test]
    fn invalid_base_is_invalid_argument() {
        let err = build_url("nope", &[], &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.compute_delay(0), Duration::from_millis(200));
        assert_eq!(policy.compute_delay(1), Duration::from_millis(400));
        assert_eq!(policy.compute_delay(10), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            let nominal = RetryPolicy {
                jitter_factor: 0.0,
                ..policy.clone()
            }
            .compute_delay(attempt);
            let jittered = policy.compute_delay(attempt);
            assert!(jittered <= nominal);
            assert!(jittered.as_millis() * 2 >= nominal.as_millis());
        }
    }
}
