// SPDX-License-Identifier: MIT OR Apache-2.0
//! API endpoint discovery.
//!
//! Resolves `{catalog, api, version}` to a base URL through the
//! platform-wide lookup service, caching results under the canonical api
//! key for hours rather than seconds.

use crate::rest::{build_url, RestClient};
use std::sync::Arc;
use strata_cache::{keys, now_epoch_seconds, LayeredCache};
use strata_error::{ApiError, Response};
use strata_model::{ApiEndpoint, Hrn};
use strata_task::CancellationContext;
use tracing::debug;

/// Default lifetime of a cached endpoint.
const DEFAULT_ENDPOINT_TTL_SECONDS: i64 = 3600;

/// Client of the API-lookup service.
#[derive(Clone)]
pub struct ApiLookupClient {
    rest: RestClient,
    cache: Arc<LayeredCache>,
    lookup_url: String,
    ttl_seconds: i64,
}

impl ApiLookupClient {
    /// Create a lookup client over the platform lookup base URL.
    pub fn new(rest: RestClient, cache: Arc<LayeredCache>, lookup_url: impl Into<String>) -> Self {
        Self {
            rest,
            cache,
            lookup_url: lookup_url.into(),
            ttl_seconds: DEFAULT_ENDPOINT_TTL_SECONDS,
        }
    }

    /// Override the endpoint cache lifetime.
    #[must_use]
    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Resolve the base URL of `api`/`version` for `catalog`.
    pub async fn lookup_api(
        &self,
        catalog: &Hrn,
        api: &str,
        version: &str,
        context: &CancellationContext,
    ) -> Response<ApiEndpoint> {
        let hrn = catalog.to_string();
        let cache_key = keys::api_key(&hrn, api, version);
        if let Some(cached) = self.cache.get_object::<ApiEndpoint>(&cache_key) {
            return Ok(cached);
        }

        let url = build_url(
            &self.lookup_url,
            &["resources", &hrn, "apis", api, version],
            &[],
        )?;
        let endpoints: Vec<ApiEndpoint> = self.rest.get_json(&url, context).await?;
        let endpoint = endpoints
            .into_iter()
            .find(|e| e.api == api && e.version == version)
            .ok_or_else(|| {
                ApiError::service_unavailable(format!("no `{api}/{version}` endpoint for {hrn}"))
            })?;

        debug!(
            target: "strata.client.lookup",
            %hrn,
            api,
            base_url = %endpoint.base_url,
            "endpoint resolved"
        );
        self.cache.put_object(
            &cache_key,
            &endpoint,
            Some(now_epoch_seconds() + self.ttl_seconds),
        );
        Ok(endpoint)
    }
}
