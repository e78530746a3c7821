//! Error types for the control API.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rfidsim_core::config::RunConfigError;

/// Errors that can occur in the control API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The request body was not valid JSON or did not match the expected shape.
    #[error("invalid body: {0}")]
    Body(#[from] JsonRejection),

    /// A field failed range or format validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The values passed validation but do not form a usable run.
    #[error("invalid run configuration: {0}")]
    RunConfig(#[from] RunConfigError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ObserverError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidRequest(errors.to_string())
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Body(rejection) => (rejection.status(), rejection.body_text()),
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RunConfig(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
