// SPDX-License-Identifier: MIT OR Apache-2.0
//! Versioned and volatile layer clients.
//!
//! The user-facing read surface: data by partition id, data handle, or
//! tile key; partition listings; prefetch; and cache management. Identical
//! concurrent reads are coalesced through the request broker, and the
//! resolve-then-fetch pipeline runs as a continuation chain on the task
//! scheduler.

use crate::blob::{BlobRepository, BlobService};
use crate::broker::RequestBroker;
use crate::catalog::CatalogClient;
use crate::chain::ContinuationChain;
use crate::options::FetchOption;
use crate::partitions::PartitionsRepository;
use crate::prefetch::{self, PrefetchRequest, PrefetchResult};
use crate::settings::ClientSettings;
use bytes::Bytes;
use std::sync::Arc;
use strata_cache::{keys, LayeredCache};
use strata_error::{ApiError, Response};
use strata_model::{Hrn, Partition, TileKey};
use strata_task::{CancellationContext, Priority, TaskScheduler};
use tracing::debug;

/// Depth of quadtree pages fetched to resolve a single tile.
const QUADTREE_DEPTH: u32 = 4;

/// How a data read addresses its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocator {
    /// Opaque partition id, resolved through the query API.
    PartitionId(String),
    /// Direct data handle; no metadata lookup.
    DataHandle(String),
    /// Tile key, resolved through quadtree metadata.
    Tile(TileKey),
}

impl DataLocator {
    fn canonical(&self) -> String {
        match self {
            Self::PartitionId(id) => format!("partition:{id}"),
            Self::DataHandle(handle) => format!("handle:{handle}"),
            Self::Tile(tile) => format!("tile:{tile}"),
        }
    }
}

/// A data read request.
#[derive(Debug, Clone)]
pub struct DataRequest {
    /// Layer to read.
    pub layer: String,
    /// Payload address.
    pub locator: DataLocator,
    /// Pinned catalog version; `None` resolves the latest (versioned
    /// layers only).
    pub version: Option<i64>,
    /// Cache/network policy.
    pub fetch_option: FetchOption,
    /// Billing tag forwarded to the platform.
    pub billing_tag: Option<String>,
}

impl DataRequest {
    /// Read `locator` from `layer` with default policy.
    pub fn new(layer: impl Into<String>, locator: DataLocator) -> Self {
        Self {
            layer: layer.into(),
            locator,
            version: None,
            fetch_option: FetchOption::default(),
            billing_tag: None,
        }
    }

    /// Pin the catalog version.
    #[must_use]
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    /// Override the fetch policy.
    #[must_use]
    pub fn with_fetch_option(mut self, fetch_option: FetchOption) -> Self {
        self.fetch_option = fetch_option;
        self
    }

    /// Attach a billing tag.
    #[must_use]
    pub fn with_billing_tag(mut self, tag: impl Into<String>) -> Self {
        self.billing_tag = Some(tag.into());
        self
    }
}

/// A partition-listing request.
#[derive(Debug, Clone)]
pub struct PartitionsRequest {
    /// Layer to list.
    pub layer: String,
    /// Specific ids to resolve; empty lists the whole layer.
    pub partition_ids: Vec<String>,
    /// Pinned catalog version.
    pub version: Option<i64>,
    /// Cache/network policy.
    pub fetch_option: FetchOption,
    /// Billing tag forwarded to the platform.
    pub billing_tag: Option<String>,
}

impl PartitionsRequest {
    /// List every partition of `layer`.
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            partition_ids: Vec::new(),
            version: None,
            fetch_option: FetchOption::default(),
            billing_tag: None,
        }
    }

    /// Restrict the listing to specific ids.
    #[must_use]
    pub fn with_partition_ids(mut self, ids: Vec<String>) -> Self {
        self.partition_ids = ids;
        self
    }

    /// Pin the catalog version.
    #[must_use]
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Shared implementation of the versioned and volatile clients; the two
/// differ only in blob endpoint and version handling.
#[derive(Clone)]
struct LayerCore {
    hrn: Hrn,
    service: BlobService,
    versioned: bool,
    catalog: CatalogClient,
    partitions: PartitionsRepository,
    blobs: BlobRepository,
    cache: Arc<LayeredCache>,
    scheduler: Arc<dyn TaskScheduler>,
    broker: Arc<RequestBroker<Bytes>>,
}

impl LayerCore {
    fn new(hrn: Hrn, service: BlobService, versioned: bool, settings: &ClientSettings) -> Response<Self> {
        Ok(Self {
            catalog: CatalogClient::new(hrn.clone(), settings)?,
            partitions: PartitionsRepository::new(hrn.clone(), settings),
            blobs: BlobRepository::new(hrn.clone(), settings),
            cache: settings.cache.clone(),
            scheduler: settings.scheduler.clone(),
            broker: Arc::new(RequestBroker::new()),
            hrn,
            service,
            versioned,
        })
    }

    /// Resolve the effective catalog version for metadata lookups.
    async fn resolve_version(
        &self,
        request: &DataRequest,
        context: &CancellationContext,
    ) -> Response<Option<i64>> {
        if !self.versioned {
            return Ok(None);
        }
        if let Some(version) = request.version {
            return Ok(Some(version));
        }
        let latest = self
            .catalog
            .get_latest_version(
                -1,
                FetchOption::OnlineIfNotFound,
                request.billing_tag.as_deref(),
                context,
            )
            .await?;
        Ok(Some(latest))
    }

    /// Resolve a locator to its data handle.
    async fn resolve_handle(
        &self,
        request: &DataRequest,
        version: Option<i64>,
        context: &CancellationContext,
    ) -> Response<String> {
        match &request.locator {
            DataLocator::DataHandle(handle) => Ok(handle.clone()),
            DataLocator::PartitionId(id) => {
                let found = self
                    .partitions
                    .get_partitions_by_id(
                        &request.layer,
                        std::slice::from_ref(id),
                        version,
                        request.fetch_option,
                        request.billing_tag.as_deref(),
                        context,
                    )
                    .await?;
                found
                    .into_iter()
                    .next()
                    .map(|p| p.data_handle)
                    .ok_or_else(|| ApiError::not_found(format!("partition {id} does not exist")))
            }
            DataLocator::Tile(tile) => {
                // A prior quadtree fetch may already have populated the
                // per-partition record.
                let cached = self
                    .partitions
                    .get_partitions_by_id(
                        &request.layer,
                        &[tile.to_string()],
                        version,
                        FetchOption::CacheOnly,
                        None,
                        context,
                    )
                    .await?;
                if let Some(partition) = cached.into_iter().next() {
                    return Ok(partition.data_handle);
                }

                let depth = QUADTREE_DEPTH.min(tile.level);
                let root = tile.changed_level_by(-(depth as i32));
                let index = self
                    .partitions
                    .get_quadtree(
                        &request.layer,
                        root,
                        depth,
                        version,
                        request.fetch_option,
                        context,
                    )
                    .await?;
                index
                    .find(root, *tile)
                    .map(|p| p.data_handle)
                    .ok_or_else(|| ApiError::not_found(format!("tile {tile} has no data")))
            }
        }
    }

    async fn get_data(
        &self,
        request: DataRequest,
        context: &CancellationContext,
    ) -> Response<Bytes> {
        if request.layer.is_empty() {
            return Err(ApiError::invalid_argument("empty layer id"));
        }
        if context.is_cancelled() {
            return Err(ApiError::cancelled());
        }

        let key = format!(
            "{}::{}::{}::{:?}::data",
            self.hrn, request.layer, request.locator.canonical(), request.version
        );
        let assoc = self.broker.create_or_associate(&key);
        // The caller's scope cancels only this caller; the shared operation
        // lives until its last caller leaves.
        let caller_token = assoc.cancel_token;
        context.execute_or_cancelled(
            || caller_token.clone(),
            || caller_token.cancel(),
        );

        if assoc.just_created {
            let this = self.clone();
            let broker = self.broker.clone();
            let completion_key = key.clone();
            let shared_context = assoc.context.clone();
            ContinuationChain::start(shared_context, {
                let this = this.clone();
                let request = request.clone();
                move |ctx| async move {
                    // Direct handle reads need no version resolution.
                    let version = match &request.locator {
                        DataLocator::DataHandle(_) => None,
                        _ => this.resolve_version(&request, &ctx).await?,
                    };
                    let handle = this.resolve_handle(&request, version, &ctx).await?;
                    Ok((request, handle))
                }
            })
            .then(move |ctx, (request, handle): (DataRequest, String)| async move {
                this.blobs
                    .get_blob(
                        &request.layer,
                        &handle,
                        this.service,
                        request.fetch_option,
                        request.billing_tag.as_deref(),
                        &ctx,
                    )
                    .await
            })
            .run(self.scheduler.as_ref(), Priority::Normal, move |result| {
                broker.complete(&completion_key, result);
            });
        }

        match assoc.receiver.await {
            Ok(result) => result,
            Err(_) => Err(ApiError::cancelled()),
        }
    }

    async fn get_partitions(
        &self,
        request: PartitionsRequest,
        context: &CancellationContext,
    ) -> Response<Vec<Partition>> {
        let version = if self.versioned {
            match request.version {
                Some(version) => Some(version),
                None => Some(
                    self.catalog
                        .get_latest_version(
                            -1,
                            FetchOption::OnlineIfNotFound,
                            request.billing_tag.as_deref(),
                            context,
                        )
                        .await?,
                ),
            }
        } else {
            None
        };
        if request.partition_ids.is_empty() {
            self.partitions
                .get_all_partitions(
                    &request.layer,
                    version,
                    request.fetch_option,
                    request.billing_tag.as_deref(),
                    context,
                )
                .await
        } else {
            self.partitions
                .get_partitions_by_id(
                    &request.layer,
                    &request.partition_ids,
                    version,
                    request.fetch_option,
                    request.billing_tag.as_deref(),
                    context,
                )
                .await
        }
    }

    async fn prefetch(
        &self,
        request: PrefetchRequest,
        context: &CancellationContext,
    ) -> Response<Vec<PrefetchResult>> {
        let version = if self.versioned {
            Some(
                self.catalog
                    .get_latest_version(
                        -1,
                        FetchOption::OnlineIfNotFound,
                        request.billing_tag.as_deref(),
                        context,
                    )
                    .await?,
            )
        } else {
            None
        };
        prefetch::prefetch_tiles(
            &self.partitions,
            &self.blobs,
            self.service,
            self.scheduler.clone(),
            request,
            version,
            context,
        )
        .await
    }

    async fn prefetch_partitions(
        &self,
        layer: &str,
        partition_ids: Vec<String>,
        priority: Priority,
        billing_tag: Option<String>,
        context: &CancellationContext,
    ) -> Response<Vec<PrefetchResult>> {
        let version = if self.versioned {
            Some(
                self.catalog
                    .get_latest_version(
                        -1,
                        FetchOption::OnlineIfNotFound,
                        billing_tag.as_deref(),
                        context,
                    )
                    .await?,
            )
        } else {
            None
        };
        prefetch::prefetch_partitions(
            &self.partitions,
            &self.blobs,
            self.service,
            self.scheduler.clone(),
            layer,
            partition_ids,
            version,
            priority,
            billing_tag,
            context,
        )
        .await
    }

    /// Cached keys of one partition: its metadata record and, when known,
    /// its blob.
    fn partition_key_family(&self, layer: &str, partition_id: &str, version: Option<i64>) -> Vec<String> {
        let hrn = self.hrn.to_string();
        let partition_key = keys::partition_key(&hrn, layer, partition_id, version);
        let mut family = Vec::with_capacity(2);
        if let Some(record) = self.cache.get_object::<Partition>(&partition_key) {
            family.push(keys::data_handle_key(&hrn, layer, &record.data_handle));
        }
        family.push(partition_key);
        family
    }

    fn remove_from_cache(&self, layer: &str, partition_id: &str, version: Option<i64>) -> bool {
        let mut removed = false;
        for key in self.partition_key_family(layer, partition_id, version) {
            removed |= self.cache.remove(&key);
        }
        debug!(
            target: "strata.client.layer",
            layer,
            partition_id,
            removed,
            "cache entry removal"
        );
        removed
    }

    fn protect(&self, layer: &str, partition_ids: &[String], version: Option<i64>) -> bool {
        let keys: Vec<String> = partition_ids
            .iter()
            .flat_map(|id| self.partition_key_family(layer, id, version))
            .collect();
        self.cache.protect(keys)
    }

    fn release(&self, layer: &str, partition_ids: &[String], version: Option<i64>) -> bool {
        let keys: Vec<String> = partition_ids
            .iter()
            .flat_map(|id| self.partition_key_family(layer, id, version))
            .collect();
        self.cache.release(keys)
    }
}

/// Read client for versioned layers.
#[derive(Clone)]
pub struct VersionedLayerClient {
    core: LayerCore,
}

impl VersionedLayerClient {
    /// Create a client for `hrn`.
    pub fn new(hrn: Hrn, settings: &ClientSettings) -> Response<Self> {
        Ok(Self {
            core: LayerCore::new(hrn, BlobService::Blob, true, settings)?,
        })
    }

    /// Fetch payload bytes for a data request.
    ///
    /// Concurrent identical requests share one metadata lookup and one
    /// blob fetch.
    pub async fn get_data(
        &self,
        request: DataRequest,
        context: &CancellationContext,
    ) -> Response<Bytes> {
        self.core.get_data(request, context).await
    }

    /// List partition metadata.
    pub async fn get_partitions(
        &self,
        request: PartitionsRequest,
        context: &CancellationContext,
    ) -> Response<Vec<Partition>> {
        self.core.get_partitions(request, context).await
    }

    /// Prefetch tiles into the cache.
    pub async fn prefetch(
        &self,
        request: PrefetchRequest,
        context: &CancellationContext,
    ) -> Response<Vec<PrefetchResult>> {
        self.core.prefetch(request, context).await
    }

    /// Prefetch partitions (by id) into the cache.
    pub async fn prefetch_partitions(
        &self,
        layer: &str,
        partition_ids: Vec<String>,
        priority: Priority,
        billing_tag: Option<String>,
        context: &CancellationContext,
    ) -> Response<Vec<PrefetchResult>> {
        self.core
            .prefetch_partitions(layer, partition_ids, priority, billing_tag, context)
            .await
    }

    /// Delete a partition's cached metadata and payload.
    pub fn remove_from_cache(&self, layer: &str, partition_id: &str, version: Option<i64>) -> bool {
        self.core.remove_from_cache(layer, partition_id, version)
    }

    /// Pin partitions (metadata and payload) against cache eviction.
    pub fn protect(&self, layer: &str, partition_ids: &[String], version: Option<i64>) -> bool {
        self.core.protect(layer, partition_ids, version)
    }

    /// Release previously pinned partitions.
    pub fn release(&self, layer: &str, partition_ids: &[String], version: Option<i64>) -> bool {
        self.core.release(layer, partition_ids, version)
    }
}

/// Read client for volatile layers.
///
/// Differs from [`VersionedLayerClient`] only in the blob endpoint
/// (`volatile-blob`) and the absence of versions in keys and lookups.
#[derive(Clone)]
pub struct VolatileLayerClient {
    core: LayerCore,
}

impl VolatileLayerClient {
    /// Create a client for `hrn`.
    pub fn new(hrn: Hrn, settings: &ClientSettings) -> Response<Self> {
        Ok(Self {
            core: LayerCore::new(hrn, BlobService::VolatileBlob, false, settings)?,
        })
    }

    /// Fetch payload bytes for a data request.
    pub async fn get_data(
        &self,
        request: DataRequest,
        context: &CancellationContext,
    ) -> Response<Bytes> {
        self.core.get_data(request, context).await
    }

    /// List partition metadata.
    pub async fn get_partitions(
        &self,
        request: PartitionsRequest,
        context: &CancellationContext,
    ) -> Response<Vec<Partition>> {
        self.core.get_partitions(request, context).await
    }

    /// Prefetch tiles into the cache.
    pub async fn prefetch(
        &self,
        request: PrefetchRequest,
        context: &CancellationContext,
    ) -> Response<Vec<PrefetchResult>> {
        self.core.prefetch(request, context).await
    }

    /// Delete a partition's cached metadata and payload.
    pub fn remove_from_cache(&self, layer: &str, partition_id: &str) -> bool {
        self.core.remove_from_cache(layer, partition_id, None)
    }

    /// Pin partitions (metadata and payload) against cache eviction.
    pub fn protect(&self, layer: &str, partition_ids: &[String]) -> bool {
        self.core.protect(layer, partition_ids, None)
    }

    /// Release previously pinned partitions.
    pub fn release(&self, layer: &str, partition_ids: &[String]) -> bool {
        self.core.release(layer, partition_ids, None)
    }
}
