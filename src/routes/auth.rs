//! Login endpoint: exchanges an opaque auth key for a canonical user context.
//!
//! The handler holds no orchestration logic of its own; it maps the
//! orchestrator's outcome onto the HTTP surface and kicks off the readiness
//! gate's automatic connect once an identity exists.

use std::collections::HashMap;

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth::{SiteMetadata, UserContext},
};

/// Request body for the login endpoint.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Opaque auth key, possibly still wrapped in stray quotes.
    pub auth_key: String,
}

/// Response body for the login endpoint.
///
/// Failures don't use this shape; they surface through
/// [`AuthError`](crate::auth::AuthError) with the kind-specific status code
/// and a `success: false` body.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user_context: UserContext,
    /// Raw metadata rows, for callers needing tenant detail beyond the
    /// canonical context.
    pub site_details: Vec<SiteMetadata>,
    pub site_key_params: HashMap<String, String>,
    pub message: String,
}

/// `POST /auth/login`
///
/// Status mapping: 200 on success, 400 invalid input, 401 verification
/// failed, 404 no metadata, 500 upstream unavailable or internal.
#[tracing::instrument(name = "auth.login", skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Response {
    match state.orchestrator.authenticate(&request.auth_key).await {
        Ok(outcome) => {
            // Drive the gate in the background; the caller polls /readiness.
            // A login while the gate is already connecting coalesces inside
            // the gate itself.
            let gate = state.gate.clone();
            tokio::spawn(async move {
                gate.connect().await;
            });

            Json(AuthResponse {
                success: true,
                user_context: outcome.user,
                site_details: outcome.site_details,
                site_key_params: outcome.site_key_params,
                message: "authenticated".to_string(),
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}
