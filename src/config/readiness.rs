use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Dependent-service readiness probing.
///
/// The gate probes `probe_url` after login. Probing is bounded: at most
/// `max_attempts` probes per cycle, `retry_delay_ms` apart, after which the
/// gate settles in the failed state until the caller retries or bypasses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadinessConfig {
    /// Health endpoint of the dependent service (GET, boolean-equivalent body).
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Maximum probes per cycle.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between probes within a cycle, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-probe timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl ReadinessConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.probe_url).map_err(|e| {
            ConfigError::Validation(format!("readiness.probe_url is not a valid URL: {}", e))
        })?;

        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "readiness.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_probe_url() -> String {
    "http://127.0.0.1:9200/health".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_probe_timeout() -> u64 {
    5
}
