//! Circuit registration, reads, and reconciliation.

use arcana_core::TxHash;
use arcana_lifecycle::{CircuitView, RegisterRequest, RegisterResult, TxOutcome};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::{circuit_id, extract_json};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/circuits", get(list_circuits))
        .route("/circuits/:id", get(get_circuit))
        .route("/circuits/:id/reconcile", post(reconcile))
}

/// POST /register: store and compile a circuit.
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResult>), AppError> {
    let request = extract_json(body)?;
    let result = state.controller.register(request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /circuits
async fn list_circuits(State(state): State<AppState>) -> Result<Json<Vec<CircuitView>>, AppError> {
    let controller = state.controller.clone();
    let views = tokio::task::spawn_blocking(move || controller.list_circuits())
        .await
        .map_err(|e| AppError::Internal(format!("list task failed: {e}")))??;
    Ok(Json(views))
}

/// GET /circuits/:id
async fn get_circuit(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<CircuitView>, AppError> {
    let id = circuit_id(&id)?;
    let controller = state.controller.clone();
    let view = tokio::task::spawn_blocking(move || controller.get_circuit(&id))
        .await
        .map_err(|e| AppError::Internal(format!("read task failed: {e}")))??;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct ReconcileRequest {
    tx_hash: TxHash,
}

/// POST /circuits/:id/reconcile: one receipt poll for a timed-out broadcast.
async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<Json<TxOutcome>, AppError> {
    let id = circuit_id(&id)?;
    let request = extract_json(body)?;
    Ok(Json(state.controller.reconcile(&id, request.tx_hash).await?))
}
