// SPDX-License-Identifier: MIT OR Apache-2.0
//! Publication state shared with the write-side clients.

use crate::versions::VersionDependency;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    /// Created, accepting uploads.
    Initialized,
    /// Submitted for processing.
    Submitted,
    /// Cancelled by the caller.
    Cancelled,
    /// Processing failed.
    Failed,
    /// Processing completed.
    Succeeded,
}

/// Timing and state details of a publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationDetails {
    /// Current lifecycle state.
    pub state: PublicationState,
    /// Service message accompanying the state, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Creation time, epoch milliseconds.
    #[serde(default)]
    pub started: i64,
    /// Last modification time, epoch milliseconds.
    #[serde(default)]
    pub modified: i64,
    /// Expiry time, epoch milliseconds.
    #[serde(default)]
    pub expires: i64,
}

/// A write-side transaction grouping modifications to one or more layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    /// Publication id.
    pub id: String,
    /// State and timing details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<PublicationDetails>,
    /// Layers modified by this publication.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layer_ids: Vec<String>,
    /// Catalog version produced by this publication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<i64>,
    /// Version dependencies declared with the publication.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_dependencies: Vec<VersionDependency>,
}
