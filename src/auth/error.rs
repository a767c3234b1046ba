use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Authentication pipeline errors.
///
/// Each variant maps to exactly one HTTP status; the kind is preserved
/// end-to-end and never downgraded to a generic error.
#[derive(Debug)]
pub enum AuthError {
    /// Missing or empty auth key. Fatal, not retried
    InvalidInput,

    /// Auth key valid in form but resolves to zero tenant records. Fatal
    /// for that key
    NoMetadataFound,

    /// Identity could not be confirmed; surfaced as unauthorized, not as a
    /// server error
    VerificationFailed,

    /// Transport failure or non-2xx from the metadata/verification
    /// endpoints. May be retried by the caller, never internally
    UpstreamUnavailable(String),

    /// Internal wiring error outside the four orchestration kinds
    Internal(String),
}

/// JSON body returned for authentication failures.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

impl AuthError {
    /// Stable error code string for the HTTP surface.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidInput => "invalid_input",
            AuthError::NoMetadataFound => "no_metadata_found",
            AuthError::VerificationFailed => "verification_failed",
            AuthError::UpstreamUnavailable(_) => "upstream_unavailable",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidInput => StatusCode::BAD_REQUEST,
            AuthError::NoMetadataFound => StatusCode::NOT_FOUND,
            AuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
            AuthError::UpstreamUnavailable(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidInput => write!(f, "Auth key is missing or empty"),
            AuthError::NoMetadataFound => {
                write!(f, "No site metadata found for the supplied auth key")
            }
            AuthError::VerificationFailed => write!(f, "Identity verification failed"),
            AuthError::UpstreamUnavailable(msg) => {
                write!(f, "Upstream identity provider unavailable: {}", msg)
            }
            AuthError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}
