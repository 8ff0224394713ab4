// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resource-name parsing for catalogs, schemas, and pipelines.
//!
//! The canonical form is `hrn:<partition>:<service>:<region>:<account>:<tail>`
//! where the tail depends on the service: one catalog-id segment for `data`,
//! `<groupId>:<schemaName>:<version>` for `schema`, one pipeline-id segment
//! for `pipeline`. `region` and `account` may be empty.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Service variant encoded in the third HRN segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// A data catalog.
    Data,
    /// A schema artifact.
    Schema,
    /// A pipeline.
    Pipeline,
    /// Unrecognised service tag.
    #[default]
    Unknown,
}

impl ServiceType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Schema => "schema",
            Self::Pipeline => "pipeline",
            Self::Unknown => "unknown",
        }
    }
}

/// Why an HRN string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HrnParseError {
    /// The string does not start with the `hrn:` prefix.
    #[error("missing `hrn:` prefix")]
    MissingPrefix,
    /// Fewer segments than the grammar requires.
    #[error("expected at least {expected} segments, got {got}")]
    TooFewSegments {
        /// Segments required by the service variant.
        expected: usize,
        /// Segments present in the input.
        got: usize,
    },
    /// The service tag is not `data`, `schema`, or `pipeline`.
    #[error("unknown service `{0}`")]
    UnknownService(String),
    /// A required tail segment is empty.
    #[error("empty required segment `{0}`")]
    EmptySegment(&'static str),
}

/// A parsed resource name.
///
/// Immutable once parsed; [`Hrn::to_string`] reproduces the canonical input
/// byte-for-byte for every valid HRN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Hrn {
    /// First segment after the prefix (realm-like partition).
    pub partition: String,
    /// Service variant.
    pub service: ServiceType,
    /// Deployment region; may be empty.
    pub region: String,
    /// Account id; may be empty.
    pub account: String,
    /// Catalog id (`data` HRNs only).
    pub catalog_id: String,
    /// Group id (`schema` HRNs only).
    pub group_id: String,
    /// Schema name (`schema` HRNs only).
    pub schema_name: String,
    /// Schema version (`schema` HRNs only).
    pub version: String,
    /// Pipeline id (`pipeline` HRNs only).
    pub pipeline_id: String,
}

impl Hrn {
    /// Build a catalog HRN `hrn:<partition>:data:::<catalogId>`.
    pub fn from_catalog_id(partition: impl Into<String>, catalog_id: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            service: ServiceType::Data,
            catalog_id: catalog_id.into(),
            ..Self::default()
        }
    }

    /// Returns `true` for the default (unparsed or failed-parse) value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.partition.is_empty() || self.service == ServiceType::Unknown
    }
}

impl FromStr for Hrn {
    type Err = HrnParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let rest = input
            .strip_prefix("hrn:")
            .ok_or(HrnParseError::MissingPrefix)?;
        let segments: Vec<&str> = rest.split(':').collect();
        if segments.len() < 5 {
            return Err(HrnParseError::TooFewSegments {
                expected: 5,
                got: segments.len(),
            });
        }

        let partition = segments[0];
        if partition.is_empty() {
            return Err(HrnParseError::EmptySegment("partition"));
        }
        let service = match segments[1] {
            "data" => ServiceType::Data,
            "schema" => ServiceType::Schema,
            "pipeline" => ServiceType::Pipeline,
            other => return Err(HrnParseError::UnknownService(other.to_string())),
        };

        let mut hrn = Hrn {
            partition: partition.to_string(),
            service,
            region: segments[2].to_string(),
            account: segments[3].to_string(),
            ..Hrn::default()
        };

        let tail = &segments[4..];
        match service {
            ServiceType::Data => {
                if tail.len() != 1 || tail[0].is_empty() {
                    return Err(HrnParseError::EmptySegment("catalogId"));
                }
                hrn.catalog_id = tail[0].to_string();
            }
            ServiceType::Schema => {
                if tail.len() != 3 {
                    return Err(HrnParseError::TooFewSegments {
                        expected: 7,
                        got: segments.len(),
                    });
                }
                if tail[0].is_empty() {
                    return Err(HrnParseError::EmptySegment("groupId"));
                }
                if tail[1].is_empty() {
                    return Err(HrnParseError::EmptySegment("schemaName"));
                }
                if tail[2].is_empty() {
                    return Err(HrnParseError::EmptySegment("version"));
                }
                hrn.group_id = tail[0].to_string();
                hrn.schema_name = tail[1].to_string();
                hrn.version = tail[2].to_string();
            }
            ServiceType::Pipeline => {
                if tail.len() != 1 || tail[0].is_empty() {
                    return Err(HrnParseError::EmptySegment("pipelineId"));
                }
                hrn.pipeline_id = tail[0].to_string();
            }
            ServiceType::Unknown => unreachable!("rejected above"),
        }

        Ok(hrn)
    }
}

impl fmt::Display for Hrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hrn:{}:{}:{}:{}:",
            self.partition,
            self.service.as_str(),
            self.region,
            self.account
        )?;
        match self.service {
            ServiceType::Schema => write!(
                f,
                "{}:{}:{}",
                self.group_id, self.schema_name, self.version
            ),
            ServiceType::Pipeline => f.write_str(&self.pipeline_id),
            _ => f.write_str(&self.catalog_id),
        }
    }
}

impl Serialize for Hrn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hrn {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_catalog_hrn() {
        let hrn: Hrn = "hrn:here:data::test:hereos-internal-test-v2".parse().unwrap();
        assert!(!hrn.is_null());
        assert_eq!(hrn.partition, "here");
        assert_eq!(hrn.service, ServiceType::Data);
        assert_eq!(hrn.region, "");
        assert_eq!(hrn.account, "test");
        assert_eq!(hrn.catalog_id, "hereos-internal-test-v2");
    }

    #[test]
    fn parses_catalog_hrn_without_account() {
        let hrn: Hrn = "hrn:here:data:::hereos-internal-test-v2".parse().unwrap();
        assert!(!hrn.is_null());
        assert_eq!(hrn.account, "");
    }

    #[test]
    fn parses_schema_hrn() {
        let hrn: Hrn = "hrn:here:schema::test:group_id:artifact_id:version"
            .parse()
            .unwrap();
        assert_eq!(hrn.service, ServiceType::Schema);
        assert_eq!(hrn.group_id, "group_id");
        assert_eq!(hrn.schema_name, "artifact_id");
        assert_eq!(hrn.version, "version");
    }

    #[test]
    fn parses_pipeline_hrn() {
        let hrn: Hrn = "hrn:here:pipeline:::test_pipeline".parse().unwrap();
        assert_eq!(hrn.service, ServiceType::Pipeline);
        assert_eq!(hrn.pipeline_id, "test_pipeline");
    }

    #[test]
    fn rejects_invalid_input() {
        assert!("".parse::<Hrn>().is_err());
        assert!("invalid_hrn".parse::<Hrn>().is_err());
        assert!("hrn:invalid_hrn".parse::<Hrn>().is_err());
    }

    #[test]
    fn rejects_missing_catalog_id() {
        assert_eq!(
            "hrn:here:data::test:".parse::<Hrn>(),
            Err(HrnParseError::EmptySegment("catalogId"))
        );
    }

    #[test]
    fn rejects_incomplete_schema_tails() {
        assert!("hrn:here:schema::test::artifact_id:version".parse::<Hrn>().is_err());
        assert!("hrn:here:schema::test:group_id::version".parse::<Hrn>().is_err());
        assert!("hrn:here:schema::test:group_id:artifact_id:".parse::<Hrn>().is_err());
    }

    #[test]
    fn rejects_unknown_service() {
        assert_eq!(
            "hrn:here:blob:::thing".parse::<Hrn>(),
            Err(HrnParseError::UnknownService("blob".into()))
        );
    }

    #[test]
    fn display_roundtrips() {
        for input in [
            "hrn:here:data::test:hereos-internal-test-v2",
            "hrn:here:data:::hereos-internal-test-v2",
            "hrn:here:schema::test:group_id:artifact_id:version",
            "hrn:here:pipeline::acct:test_pipeline",
        ] {
            let hrn: Hrn = input.parse().unwrap();
            assert_eq!(hrn.to_string(), input);
        }
    }

    #[test]
    fn from_catalog_id_matches_grammar() {
        let hrn = Hrn::from_catalog_id("here", "my-catalog");
        assert_eq!(hrn.to_string(), "hrn:here:data:::my-catalog");
        assert_eq!(hrn.to_string().parse::<Hrn>().unwrap(), hrn);
    }

    #[test]
    fn default_is_null() {
        assert!(Hrn::default().is_null());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let hrn = Hrn::from_catalog_id("here", "cat");
        let json = serde_json::to_string(&hrn).unwrap();
        assert_eq!(json, r#""hrn:here:data:::cat""#);
        let back: Hrn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hrn);
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_catalog_ids(
            partition in "[a-z][a-z0-9]{0,8}",
            region in "[a-z0-9]{0,6}",
            account in "[a-z0-9]{0,6}",
            catalog in "[a-z][a-z0-9-]{0,16}",
        ) {
            let input = format!("hrn:{partition}:data:{region}:{account}:{catalog}");
            let hrn: Hrn = input.parse().unwrap();
            prop_assert_eq!(hrn.to_string(), input);
        }
    }
}
