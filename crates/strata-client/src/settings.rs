// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-client settings bundle.
//!
//! All state a client needs is carried here, owned by the caller. There are
//! no process-wide mutable settings.

use crate::config::ClientConfig;
use crate::lookup::ApiLookupClient;
use crate::rest::{RestClient, RetryPolicy};
use std::sync::Arc;
use strata_auth::{Credentials, TokenProvider, TokenProviderSettings};
use strata_cache::{CacheSettings, LayeredCache, StoreError};
use strata_http::{Network, NetworkSettings, ReqwestNetwork, ReqwestNetworkConfig};
use strata_task::{InlineScheduler, TaskScheduler, ThreadPoolScheduler};

/// Everything a layer client needs to operate.
#[derive(Clone)]
pub struct ClientSettings {
    /// Base URL of the platform-wide API lookup service.
    pub api_lookup_url: String,
    /// Transport capability.
    pub network: Arc<dyn Network>,
    /// Task scheduler running pipelines and prefetch children.
    pub scheduler: Arc<dyn TaskScheduler>,
    /// Two-tier cache.
    pub cache: Arc<LayeredCache>,
    /// Token provider; `None` sends unauthenticated requests.
    pub token_provider: Option<Arc<TokenProvider>>,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// Per-request transport settings.
    pub network_settings: NetworkSettings,
}

impl ClientSettings {
    /// Assemble a settings bundle from a parsed [`ClientConfig`].
    ///
    /// Builds the reqwest transport, a worker-pool scheduler (inline when
    /// `task_scheduler_threads` is 0), the cache tiers, and — when
    /// credentials are given — the token provider.
    ///
    /// # Errors
    ///
    /// Returns an error when the disk cache cannot be opened or the
    /// transport cannot be constructed (misconfigured proxy).
    pub fn from_config(
        config: &ClientConfig,
        credentials: Option<Credentials>,
    ) -> Result<Self, StoreError> {
        let network: Arc<dyn Network> = Arc::new(
            ReqwestNetwork::new(ReqwestNetworkConfig {
                max_inflight: config.network.max_inflight,
                proxy: config.network.proxy.clone(),
            })
            .map_err(|err| StoreError::Backend(format!("transport construction: {err}")))?,
        );
        let scheduler: Arc<dyn TaskScheduler> = if config.task_scheduler_threads == 0 {
            Arc::new(InlineScheduler)
        } else {
            Arc::new(ThreadPoolScheduler::new(config.task_scheduler_threads))
        };
        let cache = Arc::new(LayeredCache::new(CacheSettings {
            memory_limit_bytes: config.cache.memory_limit_bytes,
            disk_limit_bytes: config.cache.disk_limit_bytes,
            disk_path: config.cache.disk_path.clone(),
            default_expiry_seconds: config.cache.default_expiry_seconds,
        })?);
        let token_provider = credentials.map(|credentials| {
            let mut settings =
                TokenProviderSettings::new(credentials, config.auth.endpoint_url());
            settings.minimum_validity_seconds = config.auth.token_min_validity_seconds;
            Arc::new(TokenProvider::new(network.clone(), settings))
        });
        Ok(Self {
            api_lookup_url: config.api_lookup_url.clone(),
            network,
            scheduler,
            cache,
            token_provider,
            retry: config.network.retry_policy(),
            network_settings: config.network.network_settings(),
        })
    }

    /// REST dispatcher wired to this bundle's transport and auth.
    #[must_use]
    pub fn rest_client(&self) -> RestClient {
        RestClient::new(
            self.network.clone(),
            self.token_provider.clone(),
            self.retry.clone(),
            self.network_settings.clone(),
        )
    }

    /// API-lookup client wired to this bundle's cache.
    #[must_use]
    pub fn lookup_client(&self) -> ApiLookupClient {
        ApiLookupClient::new(
            self.rest_client(),
            self.cache.clone(),
            self.api_lookup_url.as_str(),
        )
    }
}
