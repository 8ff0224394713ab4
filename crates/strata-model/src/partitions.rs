// SPDX-License-Identifier: MIT OR Apache-2.0
//! Partition metadata records returned by the query and metadata APIs.

use serde::{Deserialize, Serialize};

/// Metadata of one partition: the mapping from partition id to data handle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// Partition id — an opaque string, or a here-tile rendering for
    /// tile-partitioned layers.
    pub partition: String,
    /// Opaque blob identifier resolvable through the blob API.
    pub data_handle: String,
    /// Catalog version the record belongs to (versioned layers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Payload size in bytes, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size: Option<i64>,
    /// Compressed payload size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_data_size: Option<i64>,
    /// Payload checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Envelope of the partitions query response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partitions {
    /// The partition records.
    pub partitions: Vec<Partition>,
}
