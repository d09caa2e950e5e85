//! JSON body and path extraction with errors in the service's error shape.

use arcana_core::CircuitId;
use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Unwrap a JSON body, turning deserialization failures into 422s.
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

pub fn circuit_id(raw: &str) -> Result<CircuitId, AppError> {
    Ok(CircuitId::new(raw)?)
}
