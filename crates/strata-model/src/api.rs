// SPDX-License-Identifier: MIT OR Apache-2.0
//! API-lookup endpoint entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the api-lookup response: a named, versioned base URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Service name, e.g. `"blob"`, `"metadata"`, `"query"`.
    pub api: String,
    /// Service version, e.g. `"v1"`.
    pub version: String,
    /// Base URL the service is reachable at.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Additional service parameters, forwarded verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}
