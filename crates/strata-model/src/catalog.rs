// SPDX-License-Identifier: MIT OR Apache-2.0
//! Catalog and layer configuration models.

use serde::{Deserialize, Serialize};

/// Layer variants supported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    /// Versioned layer — immutable data addressed by catalog version.
    Versioned,
    /// Volatile layer — latest-value-wins, no version history.
    Volatile,
    /// Stream layer — ordered message feed.
    Stream,
    /// Index layer — attribute-indexed blobs.
    Index,
}

/// Partitioning scheme of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partitioning {
    /// `"generic"` (opaque ids) or `"heretile"` (tile keys).
    pub scheme: String,
    /// Tile levels populated by a heretile layer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tile_levels: Vec<u32>,
}

/// Configuration of a single layer within a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    /// Layer id, unique within the catalog.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Layer variant.
    pub layer_type: LayerType,
    /// How partitions are addressed.
    #[serde(default)]
    pub partitioning: Partitioning,
    /// Schema HRN, when the layer declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<LayerSchema>,
    /// MIME type of partition payloads.
    #[serde(default)]
    pub content_type: String,
    /// Payload encoding, e.g. `"gzip"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// Time to live for volatile-layer entries, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// Schema reference attached to a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSchema {
    /// HRN of the schema artifact.
    pub hrn: String,
}

/// Catalog configuration: identity plus the set of layers it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Catalog id (the HRN tail).
    pub id: String,
    /// Full catalog HRN.
    pub hrn: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Layer configurations.
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// Configuration version of the catalog.
    #[serde(default)]
    pub version: i64,
}

impl Catalog {
    /// Find a layer by id.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }
}
