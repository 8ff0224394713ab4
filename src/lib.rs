// SPDX-License-Identifier: MIT OR Apache-2.0
//! Client runtime for a layered geospatial data platform.
//!
//! `strata` re-exports the workspace crates behind one facade:
//!
//! - [`task`] — cancellation primitives, scheduling, and the task context
//! - [`http`] — the `Network` capability, reqwest transport, HAR capture
//! - [`cache`] — the two-tier key/value cache and canonical key layout
//! - [`auth`] — OAuth2 token acquisition with single-flight refresh
//! - [`model`] — HRNs, catalogs, partitions, tiles, and stream models
//! - [`client`] — catalog, layer, and stream clients plus configuration
//!
//! The commonly used types are re-exported at the crate root.

pub use strata_auth as auth;
pub use strata_cache as cache;
pub use strata_client as client;
pub use strata_error as error;
pub use strata_http as http;
pub use strata_model as model;
pub use strata_task as task;

pub use strata_auth::{Credentials, TokenProvider, TokenProviderSettings};
pub use strata_cache::{CacheSettings, LayeredCache};
pub use strata_client::{
    CatalogClient, ClientConfig, ClientSettings, DataLocator, DataRequest, FetchOption,
    PartitionsRequest, PrefetchRequest, StreamLayerClient, SubscribeRequest, VersionedLayerClient,
    VolatileLayerClient,
};
pub use strata_error::{ApiError, ErrorKind, Response};
pub use strata_http::{Network, ReqwestNetwork, ReqwestNetworkConfig};
pub use strata_model::{Hrn, TileKey};
pub use strata_task::{CancellationContext, CancellationToken, TaskContext, TaskScheduler};
