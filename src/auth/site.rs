use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::config::UpstreamConfig;

/// Sentinel for identifiers not yet known at exchange time.
pub const UNKNOWN_ID: i64 = -1;

/// One row of tenant/site metadata from the exchange endpoint.
///
/// Field names follow the upstream wire contract. Only `OtherParams` and the
/// site identifier are consumed here; the rest passes through to callers
/// that need tenant-level detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMetadata {
    #[serde(rename = "SiteID", default)]
    pub site_id: i64,

    #[serde(rename = "SiteName", default)]
    pub site_name: String,

    #[serde(rename = "SiteURL", default)]
    pub site_url: String,

    /// Serialized parameter blob (`&`-separated, `=`-delimited,
    /// percent-encoded pairs). Absent blob means no parameters, not an error.
    #[serde(rename = "OtherParams", default)]
    pub other_params: Option<String>,
}

/// Exchanges an auth key for tenant/site metadata.
///
/// Performs exactly one upstream call per invocation. Retries are a caller
/// decision: a metadata miss is usually a genuinely invalid key, not a
/// transient fault.
pub struct SiteMetadataResolver {
    config: UpstreamConfig,
    http_client: reqwest::Client,
}

impl SiteMetadataResolver {
    /// Create a resolver with a shared HTTP client.
    pub fn with_client(config: UpstreamConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Exchange a normalized, non-empty auth key for metadata rows.
    ///
    /// Fails with [`AuthError::UpstreamUnavailable`] on transport errors or
    /// non-2xx responses, and [`AuthError::NoMetadataFound`] when the
    /// upstream returns zero rows.
    pub async fn resolve(&self, auth_key: &str) -> Result<Vec<SiteMetadata>, AuthError> {
        let url = self.config.metadata_url();
        let unknown = UNKNOWN_ID.to_string();

        tracing::debug!(url = %url, "Exchanging auth key for site metadata");

        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("userId", unknown.as_str()),
                ("fromSiteId", unknown.as_str()),
                ("authKey", auth_key),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %url, "Failed to reach metadata endpoint");
                AuthError::UpstreamUnavailable(format!("metadata exchange failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Metadata endpoint returned error");
            return Err(AuthError::UpstreamUnavailable(format!(
                "metadata endpoint returned {}",
                status
            )));
        }

        let rows: Vec<SiteMetadata> = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse metadata response");
            AuthError::UpstreamUnavailable(format!("malformed metadata response: {}", e))
        })?;

        if rows.is_empty() {
            tracing::warn!("Auth key resolved to zero site metadata rows");
            return Err(AuthError::NoMetadataFound);
        }

        tracing::debug!(rows = rows.len(), site_id = rows[0].site_id, "Resolved site metadata");

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    use super::*;

    fn test_config(base_url: String) -> UpstreamConfig {
        UpstreamConfig {
            base_url,
            ..UpstreamConfig::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_returns_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/site/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "SiteID": 12, "SiteName": "Acme", "OtherParams": "adminUserId=7" }
            ])))
            .mount(&server)
            .await;

        let resolver = SiteMetadataResolver::with_client(
            test_config(server.uri()),
            reqwest::Client::new(),
        );
        let rows = resolver.resolve("abc123").await.expect("resolve should succeed");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site_id, 12);
        assert_eq!(rows[0].other_params.as_deref(), Some("adminUserId=7"));
    }

    #[tokio::test]
    async fn test_resolve_sends_sentinel_ids_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/site/metadata"))
            .and(body_string_contains("userId=-1"))
            .and(body_string_contains("fromSiteId=-1"))
            .and(body_string_contains("authKey=abc123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "SiteID": 1 }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolver = SiteMetadataResolver::with_client(
            test_config(server.uri()),
            reqwest::Client::new(),
        );
        resolver.resolve("abc123").await.expect("resolve should succeed");
    }

    #[tokio::test]
    async fn test_empty_result_is_no_metadata_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/site/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let resolver = SiteMetadataResolver::with_client(
            test_config(server.uri()),
            reqwest::Client::new(),
        );
        let result = resolver.resolve("abc123").await;

        assert!(matches!(result, Err(AuthError::NoMetadataFound)));
    }

    #[tokio::test]
    async fn test_non_2xx_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/site/metadata"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let resolver = SiteMetadataResolver::with_client(
            test_config(server.uri()),
            reqwest::Client::new(),
        );
        let result = resolver.resolve("abc123").await;

        assert!(matches!(result, Err(AuthError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_resolve_does_not_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/site/metadata"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = SiteMetadataResolver::with_client(
            test_config(server.uri()),
            reqwest::Client::new(),
        );
        let _ = resolver.resolve("abc123").await;
        // expect(1) on the mock verifies a single upstream call on drop
    }

    #[tokio::test]
    async fn test_missing_fields_take_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/site/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
            .mount(&server)
            .await;

        let resolver = SiteMetadataResolver::with_client(
            test_config(server.uri()),
            reqwest::Client::new(),
        );
        let rows = resolver.resolve("abc123").await.expect("resolve should succeed");

        assert_eq!(rows[0].site_id, 0);
        assert!(rows[0].site_name.is_empty());
        assert!(rows[0].other_params.is_none());
    }
}
