//! services/api/src/web/payments.rs
//!
//! Records simulated payments and reports a session's payment status.

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{PaymentStatusResponse, ReceiptResponse};
use crate::web::json_body;
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use serde::Deserialize;
use skillshake_core::error::BookingError;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub session_id: Option<String>,
    pub amount: Option<f64>,
    /// Three-letter currency code, `USD` when omitted.
    pub currency: Option<String>,
}

/// Record the payment for a session.
///
/// The first successful call marks the session paid and notifies the expert;
/// later calls fail with `ALREADY_PAID`.
#[utoipa::path(
    post,
    path = "/payments",
    request_body = RecordPaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ReceiptResponse),
        (status = 400, description = "Already paid or invalid input", body = ErrorBody),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub async fn record_payment_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecordPaymentRequest>, JsonRejection>,
) -> Result<Json<ReceiptResponse>, ApiError> {
    let req = json_body(payload)?;
    let (session_id, amount) = match (req.session_id, req.amount) {
        (Some(id), Some(amount)) => (id, amount),
        _ => {
            return Err(
                BookingError::Validation("sessionId and amount are required".to_string()).into(),
            )
        }
    };
    let (_, receipt) = state
        .bookings
        .record_payment(&session_id, amount, req.currency.as_deref())
        .await?;
    Ok(Json(receipt.into()))
}

/// Payment status of a session, priced from its lesson.
#[utoipa::path(
    get,
    path = "/payments/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Payment status", body = PaymentStatusResponse),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub async fn payment_status_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let summary = state.bookings.payment_summary(&session_id).await?;
    Ok(Json(summary.into()))
}
