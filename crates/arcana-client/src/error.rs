//! Client error types.

use arcana_state::CircuitState;
use serde::Deserialize;

/// The `error` object of a service error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub circuit_id: Option<String>,
    #[serde(default)]
    pub state: Option<CircuitState>,
    #[serde(default)]
    pub retryable: bool,
}

#[derive(Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

/// Errors from orchestrator API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http { endpoint: String, source: reqwest::Error },

    /// The service answered with a structured error body.
    #[error("{endpoint} returned {status}: {} ({})", .error.message, .error.code)]
    Api {
        endpoint: String,
        status: u16,
        error: ApiErrorDetail,
    },

    /// Non-2xx status without a recognizable error body (proxy, load balancer).
    #[error("{endpoint} returned {status}: {body}")]
    UnexpectedStatus { endpoint: String, status: u16, body: String },

    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization { endpoint: String, source: reqwest::Error },

    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// Machine-readable service error code, if the service produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { error, .. } => Some(&error.code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Api { error, .. } => error.retryable,
            Self::UnexpectedStatus { status, .. } => matches!(status, 502..=504),
            Self::Deserialization { .. } | Self::Config(_) => false,
        }
    }
}
