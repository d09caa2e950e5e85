//! # API Error Types
//!
//! [`AppError`] implements `IntoResponse`. Lifecycle failures are mapped by
//! their machine-readable code; the body always has the shape
//!
//! ```json
//! {"error": {"code": "...", "message": "...", "stage": "...",
//!            "circuit_id": "...", "state": {...}, "retryable": false}}
//! ```
//!
//! Store failures are logged and returned as a generic 500.

use arcana_lifecycle::{ErrorKind, LifecycleError};
use arcana_state::CircuitState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<CircuitState>,
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorDetail {
    fn plain(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            stage: None,
            circuit_id: None,
            state: None,
            retryable: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Body or path could not be parsed (422).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Logged, never returned verbatim (500).
    #[error("internal error: {0}")]
    Internal(String),
}

/// HTTP status for a lifecycle error code.
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "validation_error" | "invalid_witness" | "compile_error" | "unknown_network" | "unsupported_network"
        | "encoding_failure" => StatusCode::UNPROCESSABLE_ENTITY,
        "invalid_state" | "duplicate_circuit" | "missing_artifact" => StatusCode::CONFLICT,
        "not_found" => StatusCode::NOT_FOUND,
        "backend_unavailable" | "chain_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "prove_timeout" | "broadcast_timeout" => StatusCode::GATEWAY_TIMEOUT,
        "rejected_by_network" | "receipt_indicates_failure" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            Self::Lifecycle(e) => {
                let code = e.code();
                let message = match &e.kind {
                    ErrorKind::Store(_) => "an internal storage error occurred".to_string(),
                    kind => kind.to_string(),
                };
                let detail = ErrorDetail {
                    code: code.to_string(),
                    message,
                    stage: Some(e.stage.as_str().to_string()),
                    circuit_id: e.circuit_id.as_ref().map(|id| id.as_str().to_string()),
                    state: e.state,
                    retryable: e.is_retryable(),
                };
                (status_for(code), detail)
            }
            Self::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::plain("validation_error", msg.clone()),
            ),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorDetail::plain("unauthorized", msg.clone())),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::plain("internal_error", "an internal error occurred"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            tracing::error!(error = %self, code = %detail.code, "request failed");
        } else {
            tracing::debug!(error = %self, code = %detail.code, "request rejected");
        }
        (status, Json(ErrorBody { error: detail })).into_response()
    }
}

impl From<arcana_core::ValidationError> for AppError {
    fn from(err: arcana_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
