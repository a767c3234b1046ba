//! Service self-health endpoints for orchestration probes and monitoring.
//!
//! These report on this process, not on the dependent service guarded by the
//! readiness gate; the gate has its own surface under `/readiness`.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::{AppState, readiness::ReadinessState};

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall process status
    pub status: String,
    /// Service version
    pub version: String,
    /// Last observed state of the dependent service, informational only
    pub dependent_service: ReadinessState,
}

/// Process health with version and the dependent service's last known state.
///
/// The dependent service being down never makes this endpoint unhealthy: it
/// guards optional features, not the service itself.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependent_service: state.gate.state(),
    };

    (StatusCode::OK, Json(health))
}

/// Liveness probe.
///
/// Returns 200 if the service is running. Should always succeed unless the
/// process is completely broken.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}
