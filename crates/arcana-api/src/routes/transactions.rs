//! Unsigned transaction issuance and signed transaction broadcast.

use arcana_lifecycle::{BroadcastRequest, DeployRequest, DeploymentResult, ProofRequest, ProofResult, TxOutcome};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::AppError;
use crate::extract::extract_json;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deploy", post(deploy))
        .route("/proof", post(proof))
        .route("/broadcast", post(broadcast))
}

/// POST /deploy: unsigned verifier deployment transaction.
async fn deploy(
    State(state): State<AppState>,
    body: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<Json<DeploymentResult>, AppError> {
    let request = extract_json(body)?;
    Ok(Json(state.controller.create_deployment(request).await?))
}

/// POST /proof: generate a proof and the unsigned verification transaction.
async fn proof(
    State(state): State<AppState>,
    body: Result<Json<ProofRequest>, JsonRejection>,
) -> Result<Json<ProofResult>, AppError> {
    let request = extract_json(body)?;
    Ok(Json(state.controller.generate_proof(request).await?))
}

/// POST /broadcast: submit a client-signed transaction.
async fn broadcast(
    State(state): State<AppState>,
    body: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<TxOutcome>, AppError> {
    let request = extract_json(body)?;
    Ok(Json(state.controller.broadcast(request).await?))
}
