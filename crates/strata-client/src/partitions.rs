// SPDX-License-Identifier: MIT OR Apache-2.0
//! Partition-metadata lookup.
//!
//! Two metadata shapes behind one repository: opaque partition ids resolved
//! through the query API in batches, and tile-partitioned layers resolved
//! through quadtree index pages. The repository is layer-type agnostic; the
//! layer client picks the path.

use crate::lookup::ApiLookupClient;
use crate::options::FetchOption;
use crate::rest::{build_url, RestClient};
use crate::settings::ClientSettings;
use std::sync::Arc;
use strata_cache::{keys, LayeredCache};
use strata_error::Response;
use strata_model::{Hrn, Partition, Partitions, QuadTreeIndex, TileKey};
use strata_task::CancellationContext;
use tracing::debug;

/// Maximum partition ids per query-API request.
const QUERY_BATCH_SIZE: usize = 100;

/// Repository of partition metadata for one catalog.
#[derive(Clone)]
pub struct PartitionsRepository {
    hrn: Hrn,
    rest: RestClient,
    lookup: ApiLookupClient,
    cache: Arc<LayeredCache>,
}

impl PartitionsRepository {
    /// Create a repository for `hrn`.
    pub fn new(hrn: Hrn, settings: &ClientSettings) -> Self {
        Self {
            hrn,
            rest: settings.rest_client(),
            lookup: settings.lookup_client(),
            cache: settings.cache.clone(),
        }
    }

    /// Look up partitions by id, serving cached records and batching the
    /// misses against the query API (at most 100 ids per request).
    ///
    /// With `CacheOnly`, only the cached subset is returned; ids without a
    /// cached record are simply absent.
    pub async fn get_partitions_by_id(
        &self,
        layer: &str,
        partition_ids: &[String],
        version: Option<i64>,
        fetch_option: FetchOption,
        billing_tag: Option<&str>,
        context: &CancellationContext,
    ) -> Response<Vec<Partition>> {
        let hrn = self.hrn.to_string();
        let mut found = Vec::with_capacity(partition_ids.len());
        let mut misses: Vec<&String> = Vec::new();

        if fetch_option.reads_cache() {
            for id in partition_ids {
                let key = keys::partition_key(&hrn, layer, id, version);
                match self.cache.get_object::<Partition>(&key) {
                    Some(partition) => found.push(partition),
                    None => misses.push(id),
                }
            }
        } else {
            misses.extend(partition_ids.iter());
        }

        if misses.is_empty() || !fetch_option.may_go_online() {
            debug!(
                target: "strata.client.partitions",
                layer,
                hits = found.len(),
                misses = misses.len(),
                "partition lookup served from cache"
            );
            return Ok(found);
        }

        let endpoint = self.lookup.lookup_api(&self.hrn, "query", "v1", context).await?;
        let version_string = version.map(|v| v.to_string());
        for chunk in misses.chunks(QUERY_BATCH_SIZE) {
            let mut query: Vec<(&str, &str)> = chunk
                .iter()
                .map(|id| ("partition", id.as_str()))
                .collect();
            if let Some(v) = &version_string {
                query.push(("version", v));
            }
            if let Some(billing) = billing_tag {
                query.push(("billingTag", billing));
            }
            let url = build_url(
                &endpoint.base_url,
                &["catalogs", &hrn, "layers", layer, "partitions"],
                &query,
            )?;
            let partitions: Partitions = self.rest.get_json(&url, context).await?;
            for partition in partitions.partitions {
                let key = keys::partition_key(&hrn, layer, &partition.partition, version);
                self.cache.put_object(&key, &partition, None);
                found.push(partition);
            }
        }
        Ok(found)
    }

    /// Fetch the full partition list of a layer through the metadata API,
    /// cached under the all-partitions key.
    pub async fn get_all_partitions(
        &self,
        layer: &str,
        version: Option<i64>,
        fetch_option: FetchOption,
        billing_tag: Option<&str>,
        context: &CancellationContext,
    ) -> Response<Vec<Partition>> {
        let hrn = self.hrn.to_string();
        let list_key = keys::partitions_key(&hrn, layer, version);
        if fetch_option.reads_cache() {
            if let Some(cached) = self.cache.get_object::<Partitions>(&list_key) {
                return Ok(cached.partitions);
            }
        }
        if !fetch_option.may_go_online() {
            return Ok(Vec::new());
        }

        let endpoint = self
            .lookup
            .lookup_api(&self.hrn, "metadata", "v1", context)
            .await?;
        let version_string = version.map(|v| v.to_string());
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(v) = &version_string {
            query.push(("version", v));
        }
        if let Some(billing) = billing_tag {
            query.push(("billingTag", billing));
        }
        let url = build_url(
            &endpoint.base_url,
            &["catalogs", &hrn, "layers", layer, "partitions"],
            &query,
        )?;
        let partitions: Partitions = self.rest.get_json(&url, context).await?;
        self.cache.put_object(&list_key, &partitions, None);
        for partition in &partitions.partitions {
            let key = keys::partition_key(&hrn, layer, &partition.partition, version);
            self.cache.put_object(&key, partition, None);
        }
        Ok(partitions.partitions)
    }

    /// Fetch the quadtree index page for `(root, depth)`.
    ///
    /// On success every resolved entry is written to the cache under its
    /// per-partition key, so descendant data handles are retrievable
    /// without a further quadtree lookup.
    pub async fn get_quadtree(
        &self,
        layer: &str,
        root: TileKey,
        depth: u32,
        version: Option<i64>,
        fetch_option: FetchOption,
        context: &CancellationContext,
    ) -> Response<QuadTreeIndex> {
        let hrn = self.hrn.to_string();
        let cache_key = keys::quadtree_key(&hrn, layer, root.to_here_tile(), version, depth);
        if fetch_option.reads_cache() {
            if let Some(cached) = self.cache.get_object::<QuadTreeIndex>(&cache_key) {
                return Ok(cached);
            }
        }
        if !fetch_option.may_go_online() {
            return Ok(QuadTreeIndex::default());
        }

        let endpoint = self
            .lookup
            .lookup_api(&self.hrn, "metadata", "v1", context)
            .await?;
        let root_string = root.to_string();
        let depth_string = depth.to_string();
        let url = match version {
            Some(version) => {
                let version = version.to_string();
                build_url(
                    &endpoint.base_url,
                    &[
                        "catalogs",
                        &hrn,
                        "layers",
                        layer,
                        "versions",
                        &version,
                        "quadkeys",
                        &root_string,
                        "depths",
                        &depth_string,
                    ],
                    &[],
                )?
            }
            None => build_url(
                &endpoint.base_url,
                &[
                    "catalogs",
                    &hrn,
                    "layers",
                    layer,
                    "quadkeys",
                    &root_string,
                    "depths",
                    &depth_string,
                ],
                &[],
            )?,
        };
        let index: QuadTreeIndex = self.rest.get_json(&url, context).await?;

        self.cache.put_object(&cache_key, &index, None);
        let resolved = index.resolve(root);
        debug!(
            target: "strata.client.partitions",
            layer,
            root = %root,
            depth,
            entries = resolved.len(),
            "quadtree page fetched"
        );
        for (_tile, partition) in resolved {
            let key = keys::partition_key(&hrn, layer, &partition.partition, version);
            self.cache.put_object(&key, &partition, None);
        }
        Ok(index)
    }
}
