//! # Bearer Token Middleware
//!
//! When a token is configured every guarded route requires
//! `Authorization: Bearer <token>`. Without one, the middleware passes
//! requests through (local development).

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Auth configuration injected into request extensions.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time token comparison. Unequal lengths still run one
/// comparison so timing does not reveal the length.
fn token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());
    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let rejection = match header_value.map(|v| v.strip_prefix("Bearer ")) {
        Some(Some(provided)) if token_eq(provided, &expected) => None,
        Some(Some(_)) => Some("invalid bearer token"),
        Some(None) => Some("authorization header must use Bearer scheme"),
        None => Some("missing authorization header"),
    };
    match rejection {
        None => next.run(request).await,
        Some(reason) => {
            tracing::warn!(reason, "authentication failed");
            AppError::Unauthorized(reason.to_string()).into_response()
        }
    }
}
