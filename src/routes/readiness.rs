//! HTTP surface of the dependent-service readiness gate.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, readiness::ReadinessState};

/// Gate status as seen by the caller.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub state: ReadinessState,
    pub can_proceed: bool,
    /// Human-readable diagnostic from the last failed probe cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Response for an explicit retry.
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    #[serde(flatten)]
    pub readiness: ReadinessResponse,
    /// Whether the probe cycle this retry ran ended connected. False when
    /// the retry was coalesced into a cycle already in flight.
    pub succeeded: bool,
}

fn snapshot(state: &AppState) -> ReadinessResponse {
    ReadinessResponse {
        state: state.gate.state(),
        can_proceed: state.gate.can_proceed(),
        diagnostic: state.gate.diagnostic(),
    }
}

/// `GET /readiness`
pub async fn get_state(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(snapshot(&state))
}

/// `POST /readiness/retry`
///
/// Runs one fresh bounded probe cycle, unless one is already in flight.
#[tracing::instrument(name = "readiness.retry", skip_all)]
pub async fn retry(State(state): State<AppState>) -> Json<RetryResponse> {
    let succeeded = state.gate.retry().await;
    Json(RetryResponse {
        readiness: snapshot(&state),
        succeeded,
    })
}

/// `POST /readiness/bypass`
///
/// Lets the caller proceed without a connected dependent service. The
/// recorded state is left untouched.
#[tracing::instrument(name = "readiness.bypass", skip_all)]
pub async fn bypass(State(state): State<AppState>) -> Json<ReadinessResponse> {
    state.gate.bypass();
    Json(snapshot(&state))
}
