//! HTTP probe of the dependent service's health endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{ProbeError, ReadinessProbe};
use crate::config::ReadinessConfig;

/// Probes the dependent service over HTTP.
///
/// The health endpoint is polled via GET with no payload and answers with a
/// boolean-equivalent JSON body: `true`, a nonzero number, a `"true"`/`"1"`
/// string, or an object carrying `"ready": true` all count as ready.
pub struct HttpReadinessProbe {
    probe_url: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpReadinessProbe {
    /// Create a probe with a shared HTTP client.
    pub fn with_client(config: &ReadinessConfig, http_client: reqwest::Client) -> Self {
        Self {
            probe_url: config.probe_url.clone(),
            timeout: Duration::from_secs(config.probe_timeout_secs),
            http_client,
        }
    }
}

fn is_ready_signal(body: &Value) -> bool {
    match body {
        Value::Bool(ready) => *ready,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s == "1"
        }
        Value::Object(fields) => fields.get("ready").is_some_and(is_ready_signal),
        _ => false,
    }
}

#[async_trait]
impl ReadinessProbe for HttpReadinessProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let response = self
            .http_client
            .get(&self.probe_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProbeError::NotReady(format!(
                "health endpoint returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProbeError::Transport(format!("malformed health response: {}", e)))?;

        if is_ready_signal(&body) {
            Ok(())
        } else {
            Err(ProbeError::NotReady(format!(
                "health endpoint reported not ready: {}",
                body
            )))
        }
    }
}
