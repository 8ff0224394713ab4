// SPDX-License-Identifier: MIT OR Apache-2.0
//! Catalog version metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response of the latest-version endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    /// The latest catalog version.
    pub version: i64,
}

/// A dependency of one catalog version on another catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDependency {
    /// HRN of the dependency catalog.
    pub hrn: String,
    /// Pinned version of the dependency.
    pub version: i64,
    /// `true` when the dependency is direct rather than transitive.
    pub direct: bool,
}

/// Metadata of a single catalog version.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// The catalog version number.
    pub version: i64,
    /// Publication timestamp, epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Per-layer partition counts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partition_counts: BTreeMap<String, i64>,
    /// Dependencies of this version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<VersionDependency>,
}

/// Envelope of the list-versions response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionsResponse {
    /// Versions in the requested range.
    pub versions: Vec<VersionInfo>,
}

/// Request body for the compatible-versions endpoint: candidate dependency
/// sets for which a compatible catalog version is sought.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibleVersionsRequest {
    /// Candidate dependencies.
    pub dependencies: Vec<VersionDependency>,
}

/// Response of the compatible-versions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibleVersionsResponse {
    /// Catalog versions compatible with the requested dependencies.
    #[serde(default)]
    pub versions: Vec<VersionInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_version_payload() {
        let v: VersionResponse = serde_json::from_str(r#"{"version": 4}"#).unwrap();
        assert_eq!(v.version, 4);
    }

    #[test]
    fn version_info_payload() {
        let json = r#"{
            "version": 2,
            "timestamp": 1577836800000,
            "partitionCounts": {"testlayer": 40},
            "dependencies": [{"hrn": "hrn:here:data:::dep", "version": 1, "direct": true}]
        }"#;
        let info: VersionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.version, 2);
        assert_eq!(info.partition_counts["testlayer"], 40);
        assert!(info.dependencies[0].direct);
    }

    #[test]
    fn optional_fields_default() {
        let info: VersionInfo = serde_json::from_str(r#"{"version": 0}"#).unwrap();
        assert_eq!(info.timestamp, 0);
        assert!(info.partition_counts.is_empty());
        assert!(info.dependencies.is_empty());
    }
}
