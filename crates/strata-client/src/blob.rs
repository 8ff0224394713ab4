// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blob fetch by data handle.

use crate::lookup::ApiLookupClient;
use crate::options::FetchOption;
use crate::rest::{build_url, RestClient};
use crate::settings::ClientSettings;
use bytes::Bytes;
use std::sync::Arc;
use strata_cache::{keys, LayeredCache};
use strata_error::{ApiError, Response};
use strata_http::Method;
use strata_model::Hrn;
use strata_task::CancellationContext;
use tracing::debug;

/// Which blob endpoint a layer reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobService {
    /// The versioned-layer blob store.
    Blob,
    /// The volatile-layer blob store.
    VolatileBlob,
}

impl BlobService {
    /// API name used for endpoint lookup.
    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::VolatileBlob => "volatile-blob",
        }
    }
}

/// Repository of blob payloads for one catalog.
#[derive(Clone)]
pub struct BlobRepository {
    hrn: Hrn,
    rest: RestClient,
    lookup: ApiLookupClient,
    cache: Arc<LayeredCache>,
}

impl BlobRepository {
    /// Create a repository for `hrn`.
    pub fn new(hrn: Hrn, settings: &ClientSettings) -> Self {
        Self {
            hrn,
            rest: settings.rest_client(),
            lookup: settings.lookup_client(),
            cache: settings.cache.clone(),
        }
    }

    /// Fetch the payload behind `data_handle`, consulting the cache first.
    pub async fn get_blob(
        &self,
        layer: &str,
        data_handle: &str,
        service: BlobService,
        fetch_option: FetchOption,
        billing_tag: Option<&str>,
        context: &CancellationContext,
    ) -> Response<Bytes> {
        if data_handle.is_empty() {
            return Err(ApiError::invalid_argument("empty data handle"));
        }
        let hrn = self.hrn.to_string();
        let cache_key = keys::data_handle_key(&hrn, layer, data_handle);
        if fetch_option.reads_cache() {
            if let Some(cached) = self.cache.get(&cache_key) {
                debug!(target: "strata.client.blob", layer, data_handle, "blob cache hit");
                return Ok(cached);
            }
        }
        if !fetch_option.may_go_online() {
            return Err(ApiError::not_found(format!(
                "blob {data_handle} not cached and policy forbids fetch"
            )));
        }

        let endpoint = self
            .lookup
            .lookup_api(&self.hrn, service.api_name(), "v1", context)
            .await?;
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(billing) = billing_tag {
            query.push(("billingTag", billing));
        }
        let url = build_url(
            &endpoint.base_url,
            &["catalogs", &hrn, "layers", layer, "data", data_handle],
            &query,
        )?;
        let response = self.rest.call(Method::Get, &url, None, context).await?;
        let body = response.body;
        self.cache.put(&cache_key, body.clone(), None);
        debug!(
            target: "strata.client.blob",
            layer,
            data_handle,
            bytes = body.len(),
            "blob fetched"
        );
        Ok(body)
    }

    /// Returns `true` when the payload for `data_handle` is cached.
    #[must_use]
    pub fn is_cached(&self, layer: &str, data_handle: &str) -> bool {
        let key = keys::data_handle_key(&self.hrn.to_string(), layer, data_handle);
        self.cache.contains(&key)
    }

    /// Fetch a byte range of a blob, bypassing the cache.
    ///
    /// Reserved for large payloads; the partial body is returned as-is and
    /// never cached.
    pub async fn get_blob_range(
        &self,
        layer: &str,
        data_handle: &str,
        service: BlobService,
        offset: u64,
        length: u64,
        context: &CancellationContext,
    ) -> Response<Bytes> {
        if length == 0 {
            return Err(ApiError::invalid_argument("empty blob range"));
        }
        let hrn = self.hrn.to_string();
        let endpoint = self
            .lookup
            .lookup_api(&self.hrn, service.api_name(), "v1", context)
            .await?;
        let url = build_url(
            &endpoint.base_url,
            &["catalogs", &hrn, "layers", layer, "data", data_handle],
            &[],
        )?;
        let end = offset + length - 1;
        let response = self
            .rest
            .call_with_headers(
                Method::Get,
                &url,
                None,
                &[("Range".to_string(), format!("bytes={offset}-{end}"))],
                context,
            )
            .await?;
        Ok(response.body)
    }
}
