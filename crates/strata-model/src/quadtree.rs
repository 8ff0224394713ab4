// SPDX-License-Identifier: MIT OR Apache-2.0
//! Quadtree index pages.
//!
//! A page is fetched for `(layer, rootTile, depth)` and lists, for every
//! populated descendant up to `depth`, the data handle of its partition.
//! Entries under `subQuads` are addressed *relative* to the root tile by a
//! here-tile sub-key; `parentQuads` carries the root's own ancestors with
//! absolute partition ids.

use crate::tile::TileKey;
use crate::Partition;
use serde::{Deserialize, Serialize};

/// A populated descendant of the root tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuad {
    /// Here-tile sub-key relative to the page root.
    pub sub_quad_key: String,
    /// Version of the partition record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Data handle of the partition.
    pub data_handle: String,
    /// Payload size, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size: Option<i64>,
    /// Payload checksum, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A populated ancestor of the page root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentQuad {
    /// Absolute partition id (here-tile form).
    pub partition: String,
    /// Version of the partition record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Data handle of the partition.
    pub data_handle: String,
    /// Payload size, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size: Option<i64>,
    /// Payload checksum, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// One quadtree index page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadTreeIndex {
    /// Populated descendants, relative to the root.
    #[serde(default)]
    pub sub_quads: Vec<SubQuad>,
    /// Populated ancestors, absolute.
    #[serde(default)]
    pub parent_quads: Vec<ParentQuad>,
}

impl QuadTreeIndex {
    /// Resolve every entry of the page into `(absolute tile, partition)`
    /// pairs, given the root tile the page was fetched for.
    ///
    /// Sub-keys that do not parse as here tiles are skipped.
    #[must_use]
    pub fn resolve(&self, root: TileKey) -> Vec<(TileKey, Partition)> {
        let mut out = Vec::with_capacity(self.sub_quads.len() + self.parent_quads.len());
        for sub in &self.sub_quads {
            let Ok(rel) = sub.sub_quad_key.parse::<u64>() else {
                continue;
            };
            let Some(tile) = root.added_sub_key(rel) else {
                continue;
            };
            out.push((
                tile,
                Partition {
                    partition: tile.to_string(),
                    data_handle: sub.data_handle.clone(),
                    version: sub.version,
                    data_size: sub.data_size,
                    compressed_data_size: None,
                    checksum: sub.checksum.clone(),
                },
            ));
        }
        for parent in &self.parent_quads {
            let Ok(tile) = parent.partition.parse::<TileKey>() else {
                continue;
            };
            out.push((
                tile,
                Partition {
                    partition: parent.partition.clone(),
                    data_handle: parent.data_handle.clone(),
                    version: parent.version,
                    data_size: parent.data_size,
                    compressed_data_size: None,
                    checksum: parent.checksum.clone(),
                },
            ));
        }
        out
    }

    /// Look up the data handle for a specific absolute tile.
    #[must_use]
    pub fn find(&self, root: TileKey, tile: TileKey) -> Option<Partition> {
        self.resolve(root)
            .into_iter()
            .find(|(t, _)| *t == tile)
            .map(|(_, p)| p)
    }
}
