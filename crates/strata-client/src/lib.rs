// SPDX-License-Identifier: MIT OR Apache-2.0
//! Catalog, layer, and stream clients for the strata data platform.
//!
//! Composes the runtime subsystems — task scheduling, HTTP facade, token
//! provider, and the two-tier cache — into the user-facing read surface:
//! catalog and version metadata, partition lookup, blob fetch, prefetch,
//! and stream consumption.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod broker;
mod catalog;
mod chain;
mod config;
mod layer;
mod lookup;
mod options;
mod partitions;
mod prefetch;
mod rest;
mod settings;
mod stream;

pub use blob::{BlobRepository, BlobService};
pub use broker::{CreateOrAssociate, RequestBroker};
pub use catalog::CatalogClient;
pub use chain::ContinuationChain;
pub use config::{AuthConfig, CacheConfig, ClientConfig, ConfigError, NetworkConfig};
pub use layer::{DataLocator, DataRequest, PartitionsRequest, VersionedLayerClient, VolatileLayerClient};
pub use lookup::ApiLookupClient;
pub use options::FetchOption;
pub use partitions::PartitionsRepository;
pub use prefetch::{PrefetchJob, PrefetchRequest, PrefetchResult};
pub use rest::{HttpResponse, RestClient, RetryPolicy};
pub use settings::ClientSettings;
pub use stream::{StreamLayerClient, SubscribeRequest};
