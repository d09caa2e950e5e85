//! Service metadata: identity, health, aggregate status, networks.

use arcana_lifecycle::{HealthView, NetworkView, StatusView};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

/// Routes reachable without credentials.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/networks", get(networks))
}

/// GET /: service identity.
async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "arcana",
        "version": env!("CARGO_PKG_VERSION"),
        "default_network": state.controller.config().default_network,
    }))
}

/// GET /health: backend reachability.
async fn health(State(state): State<AppState>) -> Json<HealthView> {
    Json(state.controller.health().await)
}

/// GET /status: circuit and proof totals.
async fn status(State(state): State<AppState>) -> Result<Json<StatusView>, AppError> {
    let controller = state.controller.clone();
    let view = tokio::task::spawn_blocking(move || controller.status())
        .await
        .map_err(|e| AppError::Internal(format!("status task failed: {e}")))??;
    Ok(Json(view))
}

/// GET /networks: configured networks.
async fn networks(State(state): State<AppState>) -> Json<Vec<NetworkView>> {
    Json(state.controller.networks())
}
