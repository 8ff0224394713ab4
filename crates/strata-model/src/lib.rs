// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire and value models for the strata client runtime.
//!
//! Everything here is an immutable value: resource names, catalog and layer
//! metadata, partition records, tile keys, quadtree index pages, stream
//! messages, and publication state. All wire structs (de)serialise with
//! lower-camelCase field names as the platform emits them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod catalog;
mod hrn;
mod partitions;
mod publication;
mod quadtree;
mod stream;
mod tile;
mod versions;

pub use api::ApiEndpoint;
pub use catalog::{Catalog, Layer, LayerType, Partitioning};
pub use hrn::{Hrn, HrnParseError, ServiceType};
pub use partitions::{Partition, Partitions};
pub use publication::{Publication, PublicationDetails, PublicationState};
pub use quadtree::{ParentQuad, QuadTreeIndex, SubQuad};
pub use stream::{
    ConsumerProperties, ConsumerPropertyValue, Message, Messages, Metadata, StreamOffset,
    StreamOffsets, SubscribeMode, SubscribeResponse,
};
pub use tile::{ParseTileKeyError, TileKey, MAX_LEVEL};
pub use versions::{
    CompatibleVersionsRequest, CompatibleVersionsResponse, VersionDependency, VersionInfo,
    VersionResponse, VersionsResponse,
};
