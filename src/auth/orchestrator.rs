use std::collections::HashMap;

use super::{
    AuthError, SessionInvalidator, SiteMetadata, SiteMetadataResolver, UserContext,
    params::parse_site_params, verify::IdentityVerifier,
};

/// Strip stray wrapping quote characters from an auth key.
///
/// Keys sometimes arrive wrapped in single or double quotes by upstream
/// serialization quirks. Quotes and surrounding whitespace are stripped
/// together to a fixed point, so stripping is idempotent: stripping twice
/// equals stripping once even when whitespace sits inside the quotes.
pub fn normalize_auth_key(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
}

/// Everything a successful authentication produces.
///
/// The canonical context covers most consumers; callers that need
/// tenant-level detail beyond it get the raw metadata rows and the parsed
/// parameter mapping here.
#[derive(Debug)]
pub struct AuthOutcome {
    pub user: UserContext,
    pub site_details: Vec<SiteMetadata>,
    pub site_key_params: HashMap<String, String>,
}

/// Sequences the resolution pipeline into one atomic-from-the-caller's-view
/// operation.
///
/// Holds no in-flight de-duplication: a second concurrent call with the
/// same key is an independent request. Authentication is cheap relative to
/// the risk of starving a legitimate retry behind a stuck in-flight call.
pub struct AuthOrchestrator {
    resolver: SiteMetadataResolver,
    invalidator: SessionInvalidator,
    verifier: IdentityVerifier,
}

impl AuthOrchestrator {
    pub fn new(
        resolver: SiteMetadataResolver,
        invalidator: SessionInvalidator,
        verifier: IdentityVerifier,
    ) -> Self {
        Self {
            resolver,
            invalidator,
            verifier,
        }
    }

    /// Authenticate an opaque auth key into a canonical user context.
    ///
    /// Steps, in order, each failure terminal for the call:
    /// 1. Normalize the key; reject empty input.
    /// 2. Resolve site metadata.
    /// 3. Parse the first row's parameter blob (absent blob → empty map).
    /// 4. Invalidate a stale session on an impersonation handoff. Runs
    ///    exactly once per call.
    /// 5. Verify the identity against the first metadata row.
    pub async fn authenticate(&self, raw_key: &str) -> Result<AuthOutcome, AuthError> {
        let auth_key = normalize_auth_key(raw_key);
        if auth_key.is_empty() {
            return Err(AuthError::InvalidInput);
        }

        let site_details = self.resolver.resolve(auth_key).await?;

        let first = site_details.first().ok_or(AuthError::NoMetadataFound)?;

        let site_key_params = match first.other_params.as_deref() {
            Some(raw) => parse_site_params(raw),
            None => HashMap::new(),
        };

        self.invalidator.invalidate_if_stale(&site_key_params).await;

        let user = self.verifier.verify(first, auth_key).await?;

        tracing::info!(
            user_id = user.user_id,
            site_id = first.site_id,
            "Authentication succeeded"
        );

        Ok(AuthOutcome {
            user,
            site_details,
            site_key_params,
        })
    }
}
