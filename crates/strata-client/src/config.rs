// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and validation.
//!
//! [`ClientConfig`] is the serializable face of the settings bundle; it
//! loads from TOML and validates into advisory-free hard errors. Every
//! value has a default so partial files work.

use crate::rest::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strata_http::{NetworkSettings, ProxySettings};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file is not valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Parse error detail.
        reason: String,
    },
    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual failure messages.
        reasons: Vec<String>,
    },
}

/// Cache tier sizing and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// In-memory tier capacity in bytes; 0 disables it.
    pub memory_limit_bytes: usize,
    /// Disk tier capacity in bytes.
    pub disk_limit_bytes: usize,
    /// Disk tier directory; unset disables persistence.
    pub disk_path: Option<PathBuf>,
    /// Default entry expiry in seconds; unset stores without expiry.
    pub default_expiry_seconds: Option<i64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 1024 * 1024,
            disk_limit_bytes: 32 * 1024 * 1024,
            disk_path: None,
            default_expiry_seconds: None,
        }
    }
}

/// Transport and retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Maximum retries for transient failures.
    pub retry_max: u32,
    /// Base backoff before the first retry, in milliseconds.
    pub retry_initial_backoff_ms: u64,
    /// Jitter factor in `[0.0, 1.0]` subtracted from the nominal delay.
    pub retry_jitter: f64,
    /// Per-request transfer timeout in seconds.
    pub timeout_seconds: u64,
    /// Maximum in-flight requests before the transport sheds load.
    pub max_inflight: usize,
    /// Optional proxy.
    pub proxy: Option<ProxySettings>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            retry_max: 3,
            retry_initial_backoff_ms: 200,
            retry_jitter: 0.5,
            timeout_seconds: 30,
            max_inflight: 32,
            proxy: None,
        }
    }
}

impl NetworkConfig {
    /// Retry policy derived from this config.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_max,
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_secs(10),
            jitter_factor: self.retry_jitter,
        }
    }

    /// Per-request transport settings derived from this config.
    #[must_use]
    pub fn network_settings(&self) -> NetworkSettings {
        NetworkSettings {
            transfer_timeout: Duration::from_secs(self.timeout_seconds),
            proxy: self.proxy.clone(),
            ..NetworkSettings::default()
        }
    }
}

/// Token endpoint selection and validity policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Explicit token endpoint; overrides `environment` when set.
    pub endpoint_url: Option<String>,
    /// Named environment: `"prod"` or `"staging"`.
    pub environment: String,
    /// Minimum remaining token validity in seconds; 0 forces refresh.
    pub token_min_validity_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            environment: "prod".into(),
            token_min_validity_seconds: 300,
        }
    }
}

impl AuthConfig {
    /// The effective token endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        if let Some(url) = &self.endpoint_url {
            return url.clone();
        }
        match self.environment.as_str() {
            "staging" => "https://stg.account.api.strata.dev/oauth2/token".to_string(),
            _ => "https://account.api.strata.dev/oauth2/token".to_string(),
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Worker threads of the task scheduler; 0 runs tasks inline.
    pub task_scheduler_threads: usize,
    /// Base URL of the platform API-lookup service.
    pub api_lookup_url: String,
    /// Cache tiers.
    pub cache: CacheConfig,
    /// Transport and retry.
    pub network: NetworkConfig,
    /// Authentication.
    pub auth: AuthConfig,
}

impl ClientConfig {
    /// Load a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] or [`ConfigError::ParseError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();
        if self.api_lookup_url.is_empty() {
            reasons.push("api_lookup_url must not be empty".to_string());
        } else if url::Url::parse(&self.api_lookup_url).is_err() {
            reasons.push(format!("api_lookup_url is not a URL: {}", self.api_lookup_url));
        }
        if !(0.0..=1.0).contains(&self.network.retry_jitter) {
            reasons.push(format!(
                "network.retry_jitter must be within [0, 1], got {}",
                self.network.retry_jitter
            ));
        }
        if self.network.timeout_seconds == 0 {
            reasons.push("network.timeout_seconds must be positive".to_string());
        }
        if self.auth.environment != "prod" && self.auth.environment != "staging" {
            reasons.push(format!(
                "auth.environment must be `prod` or `staging`, got `{}`",
                self.auth.environment
            ));
        }
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_except_lookup_url() {
        let config = ClientConfig::default();
        // The lookup URL has no sensible default and must be provided.
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let raw = r#"
            task_scheduler_threads = 4
            api_lookup_url = "https://api-lookup.strata.dev/lookup/v1"

            [cache]
            memory_limit_bytes = 2048

            [network]
            retry_max = 5
            timeout_seconds = 10

            [auth]
            environment = "staging"
        "#;
        let config: ClientConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.task_scheduler_threads, 4);
        assert_eq!(config.cache.memory_limit_bytes, 2048);
        // Unspecified values fall back to defaults.
        assert_eq!(config.cache.disk_limit_bytes, 32 * 1024 * 1024);
        assert_eq!(config.network.retry_max, 5);
        assert!(config.auth.endpoint_url().starts_with("https://stg."));
    }

    #[test]
    fn explicit_auth_endpoint_wins() {
        let auth = AuthConfig {
            endpoint_url: Some("https://custom/oauth2/token".into()),
            ..AuthConfig::default()
        };
        assert_eq!(auth.endpoint_url(), "https://custom/oauth2/token");
    }

    #[test]
    fn validation_collects_all_reasons() {
        let config = ClientConfig {
            api_lookup_url: "not a url".into(),
            network: NetworkConfig {
                retry_jitter: 2.0,
                timeout_seconds: 0,
                ..NetworkConfig::default()
            },
            auth: AuthConfig {
                environment: "qa".into(),
                ..AuthConfig::default()
            },
            ..ClientConfig::default()
        };
        let Err(ConfigError::ValidationError { reasons }) = config.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(reasons.len(), 4);
    }

    #[test]
    fn load_missing_file() {
        let err = ClientConfig::load("/nonexistent/strata.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.toml");
        std::fs::write(
            &path,
            "api_lookup_url = \"https://api-lookup.strata.dev/lookup/v1\"\n",
        )
        .unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.task_scheduler_threads, 0);
    }
}
