pub mod dto;
pub mod lessons;
pub mod notifications;
pub mod payments;
pub mod rest;
pub mod sessions;
pub mod state;
pub mod users;

use crate::error::ApiError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

// Re-export the router builder so the binary can mount it directly.
pub use rest::{router, ApiDoc};

/// Unwraps a JSON body, turning a parse failure into a 400 with our error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Unwraps query parameters the same way as [`json_body`].
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}
