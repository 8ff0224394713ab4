// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical cache-key layout.
//!
//! These strings form a public cache layout shared across releases and
//! tools; they must stay byte-stable. No escaping is applied — HRN, layer,
//! partition, and handle values are used verbatim. A present version embeds
//! a trailing `::` before the suffix word.

/// Key of a discovered API endpoint: `<hrn>::<service>::<version>::api`.
#[must_use]
pub fn api_key(hrn: &str, service: &str, version: &str) -> String {
    format!("{hrn}::{service}::{version}::api")
}

/// Key of catalog metadata: `<hrn>::catalog`.
#[must_use]
pub fn catalog_key(hrn: &str) -> String {
    format!("{hrn}::catalog")
}

/// Key of the latest catalog version: `<hrn>::latestVersion`.
#[must_use]
pub fn latest_version_key(hrn: &str) -> String {
    format!("{hrn}::latestVersion")
}

/// Key of one partition record:
/// `<hrn>::<layer>::<partition>[::<version>]::partition`.
#[must_use]
pub fn partition_key(hrn: &str, layer: &str, partition: &str, version: Option<i64>) -> String {
    match version {
        Some(version) => format!("{hrn}::{layer}::{partition}::{version}::partition"),
        None => format!("{hrn}::{layer}::{partition}::partition"),
    }
}

/// Key of a layer's full partition list:
/// `<hrn>::<layer>[::<version>]::partitions`.
#[must_use]
pub fn partitions_key(hrn: &str, layer: &str, version: Option<i64>) -> String {
    match version {
        Some(version) => format!("{hrn}::{layer}::{version}::partitions"),
        None => format!("{hrn}::{layer}::partitions"),
    }
}

/// Key of the layer-versions list: `<hrn>::<version>::layerVersions`.
#[must_use]
pub fn layer_versions_key(hrn: &str, version: i64) -> String {
    format!("{hrn}::{version}::layerVersions")
}

/// Key of a quadtree index page:
/// `<hrn>::<layer>::<rootHereTile>[::<version>]::<depth>::quadtree`.
#[must_use]
pub fn quadtree_key(
    hrn: &str,
    layer: &str,
    root_here_tile: u64,
    version: Option<i64>,
    depth: u32,
) -> String {
    match version {
        Some(version) => {
            format!("{hrn}::{layer}::{root_here_tile}::{version}::{depth}::quadtree")
        }
        None => format!("{hrn}::{layer}::{root_here_tile}::{depth}::quadtree"),
    }
}

/// Key of a data blob: `<hrn>::<layer>::<dataHandle>::Data`.
#[must_use]
pub fn data_handle_key(hrn: &str, layer: &str, data_handle: &str) -> String {
    format!("{hrn}::{layer}::{data_handle}::Data")
}
