use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthError, site::SiteMetadata};
use crate::config::UpstreamConfig;

// Documented defaults for upstream fields the verifier may omit. The
// mock-flavored values are part of the observed upstream contract; the
// provenance flags on UserContext exist because their intent upstream is
// unconfirmed.
const DEFAULT_USER_ID: i64 = 1;
const DEFAULT_ORG_UNIT_ID: i64 = 1;
const DEFAULT_DISPLAY_NAME: &str = "John Doe";
const DEFAULT_AUTH_TOKEN: &str = "mock-jwt-token";
const DEFAULT_LOCALE: &str = "en-US";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Raw user fields from the verification endpoint.
///
/// Every field is optional on the wire; the canonical [`UserContext`]
/// applies documented defaults field-by-field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(rename = "UserID", default)]
    pub user_id: Option<i64>,

    #[serde(rename = "OrgUnitID", default)]
    pub org_unit_id: Option<i64>,

    #[serde(rename = "Roles", default)]
    pub roles: Option<Vec<String>>,

    #[serde(rename = "Groups", default)]
    pub groups: Option<Vec<String>>,

    #[serde(rename = "Privileges", default)]
    pub privileges: Option<Vec<String>>,

    #[serde(rename = "EmailAddress", default)]
    pub email: Option<String>,

    #[serde(rename = "DisplayName", default)]
    pub display_name: Option<String>,

    #[serde(rename = "AuthToken", default)]
    pub auth_token: Option<String>,

    #[serde(rename = "Locale", default)]
    pub locale: Option<String>,

    #[serde(rename = "TimeZone", default)]
    pub timezone: Option<String>,

    #[serde(rename = "IsSystemAdmin", default)]
    pub is_system_admin: Option<bool>,
}

/// Response from the verification endpoint.
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,

    #[serde(default)]
    user: Option<RawUser>,
}

/// Request body for the verification endpoint.
#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "siteData")]
    site_data: &'a SiteMetadata,

    #[serde(rename = "authKey")]
    auth_key: &'a str,
}

/// The canonical identity record consumed by the rest of the application.
///
/// Constructed once per successful authentication, held by the caller for
/// the session's duration, discarded on logout with no server-side
/// counterpart to revoke. Every field has a defined default so a partially
/// populated upstream response still yields a structurally complete
/// context; `defaulted_fields` records which fields took a default instead
/// of an upstream value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: i64,
    pub org_unit_id: i64,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub privileges: Vec<String>,
    pub email: String,
    pub display_name: String,
    /// Token for subsequent calls on this user's behalf.
    pub auth_token: String,
    pub locale: String,
    pub timezone: String,
    pub is_system_admin: bool,
    pub authenticated_at: DateTime<Utc>,
    /// Names of fields that took their documented default because the
    /// upstream omitted them. A context whose `user_id` appears here was
    /// synthesized, not verified, and must not be trusted on its own.
    pub defaulted_fields: Vec<String>,
}

impl UserContext {
    /// Build the canonical context from a verified raw response,
    /// defaulting absent fields and recording their provenance.
    fn from_raw(raw: RawUser) -> Self {
        let mut defaulted = Vec::new();

        let user_id = raw.user_id.unwrap_or_else(|| {
            defaulted.push("user_id".to_string());
            DEFAULT_USER_ID
        });
        let org_unit_id = raw.org_unit_id.unwrap_or_else(|| {
            defaulted.push("org_unit_id".to_string());
            DEFAULT_ORG_UNIT_ID
        });
        let roles = raw.roles.unwrap_or_else(|| {
            defaulted.push("roles".to_string());
            Vec::new()
        });
        let groups = raw.groups.unwrap_or_else(|| {
            defaulted.push("groups".to_string());
            Vec::new()
        });
        let privileges = raw.privileges.unwrap_or_else(|| {
            defaulted.push("privileges".to_string());
            Vec::new()
        });
        let email = raw.email.unwrap_or_else(|| {
            defaulted.push("email".to_string());
            String::new()
        });
        let display_name = raw.display_name.unwrap_or_else(|| {
            defaulted.push("display_name".to_string());
            DEFAULT_DISPLAY_NAME.to_string()
        });
        let auth_token = raw.auth_token.unwrap_or_else(|| {
            defaulted.push("auth_token".to_string());
            DEFAULT_AUTH_TOKEN.to_string()
        });
        let locale = raw.locale.unwrap_or_else(|| {
            defaulted.push("locale".to_string());
            DEFAULT_LOCALE.to_string()
        });
        let timezone = raw.timezone.unwrap_or_else(|| {
            defaulted.push("timezone".to_string());
            DEFAULT_TIMEZONE.to_string()
        });
        let is_system_admin = raw.is_system_admin.unwrap_or_else(|| {
            defaulted.push("is_system_admin".to_string());
            false
        });

        Self {
            user_id,
            org_unit_id,
            roles,
            groups,
            privileges,
            email,
            display_name,
            auth_token,
            locale,
            timezone,
            is_system_admin,
            authenticated_at: Utc::now(),
            defaulted_fields: defaulted,
        }
    }

    /// Whether any field was synthesized from a default.
    pub fn has_defaulted_fields(&self) -> bool {
        !self.defaulted_fields.is_empty()
    }
}

/// Confirms a resolved identity against the upstream verification endpoint
/// and normalizes the response into the canonical [`UserContext`].
pub struct IdentityVerifier {
    config: UpstreamConfig,
    http_client: reqwest::Client,
}

impl IdentityVerifier {
    /// Create a verifier with a shared HTTP client.
    pub fn with_client(config: UpstreamConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Verify the identity resolved from `site` with the cleaned auth key.
    ///
    /// A structurally successful response without a positive verification
    /// flag fails with [`AuthError::VerificationFailed`]: the key was
    /// syntactically valid but the identity could not be confirmed, which
    /// is unauthorized, not a server error.
    pub async fn verify(
        &self,
        site: &SiteMetadata,
        auth_key: &str,
    ) -> Result<UserContext, AuthError> {
        let url = self.config.verify_url();

        tracing::debug!(url = %url, site_id = site.site_id, "Verifying resolved identity");

        let response = self
            .http_client
            .post(&url)
            .json(&VerifyRequest {
                site_data: site,
                auth_key,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %url, "Failed to reach verification endpoint");
                AuthError::UpstreamUnavailable(format!("identity verification failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Verification endpoint returned error");
            return Err(AuthError::UpstreamUnavailable(format!(
                "verification endpoint returned {}",
                status
            )));
        }

        let verified: VerifyResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse verification response");
            AuthError::UpstreamUnavailable(format!("malformed verification response: {}", e))
        })?;

        if !verified.success {
            tracing::warn!(site_id = site.site_id, "Identity verification rejected");
            return Err(AuthError::VerificationFailed);
        }

        let context = UserContext::from_raw(verified.user.unwrap_or_default());

        if context.has_defaulted_fields() {
            tracing::debug!(
                fields = ?context.defaulted_fields,
                "Verification response omitted fields, defaults applied"
            );
        }

        Ok(context)
    }
}
