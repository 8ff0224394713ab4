// SPDX-License-Identifier: MIT OR Apache-2.0
//! Catalog configuration and version metadata.

use crate::lookup::ApiLookupClient;
use crate::options::FetchOption;
use crate::rest::{build_url, RestClient};
use crate::settings::ClientSettings;
use bytes::Bytes;
use futures::FutureExt;
use std::sync::Arc;
use strata_cache::{keys, now_epoch_seconds, LayeredCache};
use strata_error::{ApiError, Response};
use strata_model::{
    Catalog, CompatibleVersionsRequest, CompatibleVersionsResponse, Hrn, VersionInfo,
    VersionResponse, VersionsResponse,
};
use strata_task::{CancellationContext, Priority, TaskScheduler};
use tracing::debug;

/// Lifetime of cached catalog configuration.
const CATALOG_TTL_SECONDS: i64 = 3600;
/// Lifetime of the cached latest version — inherently volatile, kept short.
const LATEST_VERSION_TTL_SECONDS: i64 = 60;

/// Client for catalog configuration and version metadata.
#[derive(Clone)]
pub struct CatalogClient {
    hrn: Hrn,
    rest: RestClient,
    lookup: ApiLookupClient,
    cache: Arc<LayeredCache>,
    scheduler: Arc<dyn TaskScheduler>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("hrn", &self.hrn)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a client for `hrn`.
    pub fn new(hrn: Hrn, settings: &ClientSettings) -> Response<Self> {
        if hrn.is_null() {
            return Err(ApiError::invalid_argument("null catalog HRN"));
        }
        Ok(Self {
            hrn,
            rest: settings.rest_client(),
            lookup: settings.lookup_client(),
            cache: settings.cache.clone(),
            scheduler: settings.scheduler.clone(),
        })
    }

    /// The catalog this client reads.
    #[must_use]
    pub fn hrn(&self) -> &Hrn {
        &self.hrn
    }

    /// Fetch the catalog configuration.
    pub async fn get_catalog(
        &self,
        fetch_option: FetchOption,
        billing_tag: Option<&str>,
        context: &CancellationContext,
    ) -> Response<Catalog> {
        let hrn = self.hrn.to_string();
        let cache_key = keys::catalog_key(&hrn);
        let this = self.clone();
        let billing = billing_tag.map(str::to_string);
        self.with_policy(fetch_option, cache_key.clone(), context, move |ctx| {
            async move {
                let endpoint = this.lookup.lookup_api(&this.hrn, "config", "v1", &ctx).await?;
                let mut query: Vec<(&str, &str)> = Vec::new();
                if let Some(billing) = &billing {
                    query.push(("billingTag", billing));
                }
                let url = build_url(&endpoint.base_url, &["catalogs", &hrn], &query)?;
                let catalog: Catalog = this.rest.get_json(&url, &ctx).await?;
                this.cache.put_object(
                    &cache_key,
                    &catalog,
                    Some(now_epoch_seconds() + CATALOG_TTL_SECONDS),
                );
                Ok(catalog)
            }
        })
        .await
    }

    /// Resolve the latest catalog version at or above `start_version`.
    pub async fn get_latest_version(
        &self,
        start_version: i64,
        fetch_option: FetchOption,
        billing_tag: Option<&str>,
        context: &CancellationContext,
    ) -> Response<i64> {
        let hrn = self.hrn.to_string();
        let cache_key = keys::latest_version_key(&hrn);
        let this = self.clone();
        let billing = billing_tag.map(str::to_string);
        let version: VersionResponse = self
            .with_policy(fetch_option, cache_key.clone(), context, move |ctx| {
                async move {
                    let endpoint = this
                        .lookup
                        .lookup_api(&this.hrn, "metadata", "v1", &ctx)
                        .await?;
                    let start = start_version.to_string();
                    let mut query: Vec<(&str, &str)> = vec![("startVersion", &start)];
                    if let Some(billing) = &billing {
                        query.push(("billingTag", billing));
                    }
                    let url = build_url(
                        &endpoint.base_url,
                        &["catalogs", &hrn, "versions", "latest"],
                        &query,
                    )?;
                    let version: VersionResponse = this.rest.get_json(&url, &ctx).await?;
                    this.cache.put_object(
                        &cache_key,
                        &version,
                        Some(now_epoch_seconds() + LATEST_VERSION_TTL_SECONDS),
                    );
                    Ok(version)
                }
            })
            .await?;
        Ok(version.version)
    }

    /// List version metadata in `[start_version, end_version]`.
    pub async fn list_versions(
        &self,
        start_version: i64,
        end_version: i64,
        context: &CancellationContext,
    ) -> Response<Vec<VersionInfo>> {
        let hrn = self.hrn.to_string();
        let endpoint = self
            .lookup
            .lookup_api(&self.hrn, "metadata", "v1", context)
            .await?;
        let start = start_version.to_string();
        let end = end_version.to_string();
        let url = build_url(
            &endpoint.base_url,
            &["catalogs", &hrn, "versions"],
            &[("startVersion", &start), ("endVersion", &end)],
        )?;
        let versions: VersionsResponse = self.rest.get_json(&url, context).await?;
        Ok(versions.versions)
    }

    /// Find catalog versions compatible with the given dependency set.
    pub async fn get_compatible_versions(
        &self,
        request: &CompatibleVersionsRequest,
        limit: u32,
        context: &CancellationContext,
    ) -> Response<Vec<VersionInfo>> {
        let hrn = self.hrn.to_string();
        let endpoint = self
            .lookup
            .lookup_api(&self.hrn, "metadata", "v1", context)
            .await?;
        let limit = limit.to_string();
        let url = build_url(
            &endpoint.base_url,
            &["catalogs", &hrn, "versions", "compatible"],
            &[("limit", &limit)],
        )?;
        let body = serde_json::to_vec(request)
            .map_err(|err| ApiError::invalid_argument(format!("unserialisable request: {err}")))?;
        let response = self
            .rest
            .call(strata_http::Method::Post, &url, Some(Bytes::from(body)), context)
            .await?;
        let compatible: CompatibleVersionsResponse = response.json()?;
        Ok(compatible.versions)
    }

    /// Apply the fetch policy around an online fetch that writes the cache.
    async fn with_policy<T, F, Fut>(
        &self,
        fetch_option: FetchOption,
        cache_key: String,
        context: &CancellationContext,
        online: F,
    ) -> Response<T>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
        F: FnOnce(CancellationContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Response<T>> + Send + 'static,
    {
        if fetch_option.reads_cache() {
            if let Some(cached) = self.cache.get_object::<T>(&cache_key) {
                debug!(target: "strata.client.catalog", key = %cache_key, "cache hit");
                if fetch_option == FetchOption::CacheWithUpdate {
                    // Refresh in the background on a detached context.
                    let refresh = online(CancellationContext::new());
                    self.scheduler.schedule_with_priority(
                        Priority::Low,
                        async move {
                            let _ = refresh.await;
                        }
                        .boxed(),
                    );
                }
                return Ok(cached);
            }
        }
        if !fetch_option.may_go_online() {
            return Err(ApiError::not_found(format!(
                "not cached and offline policy forbids fetch: {cache_key}"
            )));
        }
        online(context.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::RetryPolicy;
    use strata_cache::{CacheSettings, InMemoryStore};
    use strata_error::ErrorKind;
    use strata_http::{Network, NetworkSettings, ReqwestNetwork, ReqwestNetworkConfig};
    use strata_task::InlineScheduler;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HRN: &str = "hrn:here:data:::hereos-internal-test-v2";

    fn settings(server: &MockServer) -> ClientSettings {
        let network: Arc<dyn Network> =
            Arc::new(ReqwestNetwork::new(ReqwestNetworkConfig::default()).unwrap());
        ClientSettings {
            api_lookup_url: format!("{}/lookup/v1", server.uri()),
            network,
            scheduler: Arc::new(InlineScheduler),
            cache: Arc::new(
                LayeredCache::with_store(CacheSettings::default(), Arc::new(InMemoryStore::new()))
                    .unwrap(),
            ),
            token_provider: None,
            retry: RetryPolicy {
                max_retries: 0,
                ..RetryPolicy::default()
            },
            network_settings: NetworkSettings::default(),
        }
    }

    async fn mount_lookup(server: &MockServer, api: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/lookup/v1/resources/{HRN}/apis/{api}/v1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "api": api,
                "version": "v1",
                "baseURL": format!("{}/{}/v1", server.uri(), api),
            }])))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> CatalogClient {
        CatalogClient::new(HRN.parse().unwrap(), &settings(server)).unwrap()
    }

    #[tokio::test]
    async fn get_catalog_caches_result() {
        let server = MockServer::start().await;
        mount_lookup(&server, "config").await;
        Mock::given(method("GET"))
            .and(path(format!("/config/v1/catalogs/{HRN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "hereos-internal-test-v2",
                "hrn": HRN,
                "layers": [],
                "version": 3,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let ctx = CancellationContext::new();
        let first = client
            .get_catalog(FetchOption::default(), None, &ctx)
            .await
            .unwrap();
        assert_eq!(first.version, 3);
        // Second read is served from cache (mock expects one hit).
        let second = client
            .get_catalog(FetchOption::default(), None, &ctx)
            .await
            .unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn cache_only_miss_is_not_found() {
        let server = MockServer::start().await;
        let client = client(&server);
        let err = client
            .get_catalog(FetchOption::CacheOnly, None, &CancellationContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn latest_version_queries_start_version() {
        let server = MockServer::start().await;
        mount_lookup(&server, "metadata").await;
        Mock::given(method("GET"))
            .and(path(format!("/metadata/v1/catalogs/{HRN}/versions/latest")))
            .and(query_param("startVersion", "-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": 4})),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let version = client
            .get_latest_version(-1, FetchOption::OnlineOnly, None, &CancellationContext::new())
            .await
            .unwrap();
        assert_eq!(version, 4);
    }

    #[tokio::test]
    async fn list_versions_parses_range() {
        let server = MockServer::start().await;
        mount_lookup(&server, "metadata").await;
        Mock::given(method("GET"))
            .and(path(format!("/metadata/v1/catalogs/{HRN}/versions")))
            .and(query_param("startVersion", "1"))
            .and(query_param("endVersion", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "versions": [
                    {"version": 2, "timestamp": 10},
                    {"version": 3, "timestamp": 20}
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let versions = client
            .list_versions(1, 3, &CancellationContext::new())
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].version, 3);
    }

    #[tokio::test]
    async fn null_hrn_is_rejected() {
        let server = MockServer::start().await;
        let err = CatalogClient::new(Hrn::default(), &settings(&server)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
