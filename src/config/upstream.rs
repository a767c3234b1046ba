use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Upstream identity provider endpoints.
///
/// The metadata endpoint exchanges an auth key for tenant metadata; the
/// verification endpoint confirms the resolved identity. Both live under
/// `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the identity provider.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the metadata exchange endpoint (URL-encoded form POST).
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,

    /// Path of the identity verification endpoint (JSON POST).
    #[serde(default = "default_verify_path")]
    pub verify_path: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("upstream.base_url is not a valid URL: {}", e))
        })?;

        for (name, path) in [
            ("upstream.metadata_path", &self.metadata_path),
            ("upstream.verify_path", &self.verify_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "{} must start with '/': {}",
                    name, path
                )));
            }
        }

        Ok(())
    }

    /// Full URL of the metadata exchange endpoint.
    pub fn metadata_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.metadata_path)
    }

    /// Full URL of the identity verification endpoint.
    pub fn verify_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.verify_path)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            metadata_path: default_metadata_path(),
            verify_path: default_verify_path(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:9100".to_string()
}

fn default_metadata_path() -> String {
    "/api/site/metadata".to_string()
}

fn default_verify_path() -> String {
    "/api/identity/verify".to_string()
}

fn default_upstream_timeout() -> u64 {
    15
}
