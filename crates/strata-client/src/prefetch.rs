// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fan-out prefetch with a shared cancel and progress aggregator.
//!
//! The engine resolves the quadtrees covering the requested tiles, then
//! fans one scheduler task out per uncached data handle. All children share
//! a [`PrefetchJob`]: each reports its per-item outcome, and the aggregate
//! is delivered once — or `Cancelled` wins when any cancel fired.

use crate::blob::{BlobRepository, BlobService};
use crate::options::FetchOption;
use crate::partitions::PartitionsRepository;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use strata_error::{ApiError, Response};
use strata_model::TileKey;
use strata_task::{CancellationContext, Priority, TaskScheduler};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Maximum quadtree page depth per metadata request.
const PAGE_DEPTH: u32 = 4;

/// A tile prefetch request.
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    /// Layer to prefetch.
    pub layer: String,
    /// Root tiles to expand.
    pub tile_keys: Vec<TileKey>,
    /// Lowest level to materialise.
    pub min_level: u32,
    /// Highest level to materialise.
    pub max_level: u32,
    /// Scheduler priority of the child fetches.
    pub priority: Priority,
    /// Billing tag forwarded to the platform.
    pub billing_tag: Option<String>,
}

impl PrefetchRequest {
    /// Prefetch `tile_keys` at their own levels only.
    pub fn new(layer: impl Into<String>, tile_keys: Vec<TileKey>) -> Self {
        let min = tile_keys.iter().map(|t| t.level).min().unwrap_or(0);
        let max = tile_keys.iter().map(|t| t.level).max().unwrap_or(0);
        Self {
            layer: layer.into(),
            tile_keys,
            min_level: min,
            max_level: max,
            priority: Priority::Low,
            billing_tag: None,
        }
    }

    /// Expand the level range to `[min, max]`.
    #[must_use]
    pub fn with_levels(mut self, min_level: u32, max_level: u32) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }

    /// Override the child-task priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Outcome of one prefetched item.
#[derive(Debug, Clone)]
pub struct PrefetchResult {
    /// Tile (here-tile form) or partition id.
    pub item: String,
    /// The per-item failure, `None` on success.
    pub error: Option<ApiError>,
}

impl PrefetchResult {
    /// Returns `true` when the item was fetched (or already cached).
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

struct JobState {
    remaining: usize,
    results: Vec<PrefetchResult>,
    cancelled: bool,
    child_contexts: Vec<CancellationContext>,
    done: Option<oneshot::Sender<Response<Vec<PrefetchResult>>>>,
}

/// Shared aggregator of one prefetch operation.
pub struct PrefetchJob {
    state: Mutex<JobState>,
}

impl PrefetchJob {
    fn new(task_count: usize, done: oneshot::Sender<Response<Vec<PrefetchResult>>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(JobState {
                remaining: task_count,
                results: Vec::with_capacity(task_count),
                cancelled: false,
                child_contexts: Vec::with_capacity(task_count),
                done: Some(done),
            }),
        })
    }

    /// Register a child task, returning its cancellation scope.
    pub fn add_task(&self) -> CancellationContext {
        let mut state = self.state.lock().expect("prefetch job lock poisoned");
        let context = CancellationContext::new();
        if state.cancelled {
            context.cancel_operation();
        }
        state.child_contexts.push(context.clone());
        context
    }

    /// Record a child outcome; the last one delivers the aggregate.
    pub fn complete_task(&self, item: impl Into<String>, error: Option<ApiError>) {
        let mut state = self.state.lock().expect("prefetch job lock poisoned");
        state.results.push(PrefetchResult {
            item: item.into(),
            error,
        });
        state.remaining -= 1;
        if state.remaining == 0 {
            let results = std::mem::take(&mut state.results);
            let cancelled = state.cancelled;
            if let Some(done) = state.done.take() {
                info!(
                    target: "strata.client.prefetch",
                    items = results.len(),
                    cancelled,
                    "prefetch finished"
                );
                let _ = done.send(if cancelled {
                    Err(ApiError::cancelled())
                } else {
                    Ok(results)
                });
            }
        }
    }

    /// Cancel every child; the aggregate is delivered as `Cancelled`.
    pub fn cancel(&self) {
        let contexts: Vec<CancellationContext> = {
            let mut state = self.state.lock().expect("prefetch job lock poisoned");
            state.cancelled = true;
            state.child_contexts.clone()
        };
        for context in contexts {
            context.cancel_operation();
        }
    }
}

/// Expand the requested roots into `(tile, data handle)` targets by
/// fetching the covering quadtree pages.
async fn resolve_tile_targets(
    partitions: &PartitionsRepository,
    request: &PrefetchRequest,
    version: Option<i64>,
    context: &CancellationContext,
) -> Response<BTreeMap<String, String>> {
    let mut roots: BTreeSet<TileKey> = BTreeSet::new();
    for tile in &request.tile_keys {
        roots.insert(*tile);
    }

    let mut targets: BTreeMap<String, String> = BTreeMap::new();
    for root in roots {
        let depth = PAGE_DEPTH.min(request.max_level.saturating_sub(root.level));
        let index = partitions
            .get_quadtree(
                &request.layer,
                root,
                depth,
                version,
                FetchOption::OnlineIfNotFound,
                context,
            )
            .await?;
        for (tile, partition) in index.resolve(root) {
            if tile.level < request.min_level || tile.level > request.max_level {
                continue;
            }
            if !root.is_ancestor_or_self(&tile) {
                continue;
            }
            targets.insert(tile.to_string(), partition.data_handle);
        }
    }
    Ok(targets)
}

/// Fan a blob fetch out per target, sharing one aggregator.
#[allow(clippy::too_many_arguments)]
async fn run_job(
    blobs: &BlobRepository,
    service: BlobService,
    scheduler: Arc<dyn TaskScheduler>,
    layer: &str,
    targets: BTreeMap<String, String>,
    priority: Priority,
    billing_tag: Option<String>,
    context: &CancellationContext,
) -> Response<Vec<PrefetchResult>> {
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let (done_tx, done_rx) = oneshot::channel();
    let job = PrefetchJob::new(targets.len(), done_tx);

    // The caller's scope cancels the whole job.
    {
        let job = job.clone();
        context.execute_or_cancelled(
            move || {
                let job_for_token = job.clone();
                strata_task::CancellationToken::new(move || job_for_token.cancel())
            },
            || {},
        );
    }
    if context.is_cancelled() {
        job.cancel();
    }

    debug!(
        target: "strata.client.prefetch",
        layer,
        tasks = targets.len(),
        "prefetch fan-out"
    );
    for (item, handle) in targets {
        let child_context = job.add_task();
        let job = job.clone();
        let blobs = blobs.clone();
        let layer = layer.to_string();
        let billing = billing_tag.clone();
        scheduler.schedule_with_priority(
            priority,
            async move {
                if child_context.is_cancelled() {
                    job.complete_task(item, Some(ApiError::cancelled()));
                    return;
                }
                if blobs.is_cached(&layer, &handle) {
                    job.complete_task(item, None);
                    return;
                }
                let outcome = blobs
                    .get_blob(
                        &layer,
                        &handle,
                        service,
                        FetchOption::OnlineIfNotFound,
                        billing.as_deref(),
                        &child_context,
                    )
                    .await;
                job.complete_task(item, outcome.err());
            }
            .boxed(),
        );
    }

    match done_rx.await {
        Ok(result) => result,
        Err(_) => Err(ApiError::cancelled()),
    }
}

/// Prefetch every populated tile reachable from the requested roots within
/// the level range.
pub(crate) async fn prefetch_tiles(
    partitions: &PartitionsRepository,
    blobs: &BlobRepository,
    service: BlobService,
    scheduler: Arc<dyn TaskScheduler>,
    request: PrefetchRequest,
    version: Option<i64>,
    context: &CancellationContext,
) -> Response<Vec<PrefetchResult>> {
    if request.tile_keys.is_empty() {
        return Err(ApiError::invalid_argument("no tile keys to prefetch"));
    }
    if request.min_level > request.max_level {
        return Err(ApiError::invalid_argument(format!(
            "invalid level range [{}, {}]",
            request.min_level, request.max_level
        )));
    }
    let targets = resolve_tile_targets(partitions, &request, version, context).await?;
    run_job(
        blobs,
        service,
        scheduler,
        &request.layer,
        targets,
        request.priority,
        request.billing_tag.clone(),
        context,
    )
    .await
}

/// Prefetch the payloads of specific partition ids.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn prefetch_partitions(
    repository: &PartitionsRepository,
    blobs: &BlobRepository,
    service: BlobService,
    scheduler: Arc<dyn TaskScheduler>,
    layer: &str,
    partition_ids: Vec<String>,
    version: Option<i64>,
    priority: Priority,
    billing_tag: Option<String>,
    context: &CancellationContext,
) -> Response<Vec<PrefetchResult>> {
    if partition_ids.is_empty() {
        return Err(ApiError::invalid_argument("no partition ids to prefetch"));
    }
    let records = repository
        .get_partitions_by_id(
            layer,
            &partition_ids,
            version,
            FetchOption::OnlineIfNotFound,
            billing_tag.as_deref(),
            context,
        )
        .await?;
    let targets: BTreeMap<String, String> = records
        .into_iter()
        .map(|p| (p.partition, p.data_handle))
        .collect();
    run_job(
        blobs,
        service,
        scheduler,
        layer,
        targets,
        priority,
        billing_tag,
        context,
    )
    .await
}
