//! services/api/src/web/sessions.rs
//!
//! Axum handlers for booking sessions and moving them through their lifecycle.

use crate::error::ApiError;
use crate::web::dto::{ReceiptResponse, SessionResponse};
use crate::web::state::AppState;
use crate::web::{json_body, query_params};
use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillshake_core::domain::{Page, PaymentStatus, SessionFilter, SessionStatus};
use skillshake_core::error::BookingError;
use skillshake_core::lifecycle::{validate_rating, NewSession, SessionTransition};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// API Request and Response Payload Structs
//=========================================================================================

/// Payload for booking a lesson. Missing fields are reported as 400.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub lesson_id: Option<String>,
    #[serde(alias = "learnerUserId")]
    pub learner_id: Option<String>,
    #[serde(alias = "expertUserId")]
    pub expert_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize, IntoParams, Debug)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    /// Sessions where this user is the learner or the expert.
    pub user_id: Option<String>,
    /// One of `pending`, `confirmed` (or `active`), `completed`, `cancelled`.
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Field-style update. Exactly one change per request: a status, a payment
/// status, or a review (`rating` with optional `review`).
#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub rating: Option<i64>,
    pub review: Option<String>,
}

impl TryFrom<UpdateSessionRequest> for SessionTransition {
    type Error = BookingError;

    fn try_from(req: UpdateSessionRequest) -> Result<Self, Self::Error> {
        let wants_review = req.rating.is_some() || req.review.is_some();
        let requested = [req.status.is_some(), req.payment_status.is_some(), wants_review]
            .iter()
            .filter(|set| **set)
            .count();
        if requested != 1 {
            return Err(BookingError::Validation(
                "Provide exactly one of status, paymentStatus or rating/review".to_string(),
            ));
        }

        if let Some(status) = req.status {
            let status = status
                .parse::<SessionStatus>()
                .map_err(|e| BookingError::Validation(e.to_string()))?;
            return match status {
                SessionStatus::Confirmed => Ok(SessionTransition::Confirm),
                SessionStatus::Completed => Ok(SessionTransition::Complete),
                SessionStatus::Cancelled => Ok(SessionTransition::Cancel),
                SessionStatus::Pending => Err(BookingError::InvalidState(
                    "Sessions cannot return to pending".to_string(),
                )),
            };
        }

        if let Some(payment_status) = req.payment_status {
            let payment_status = payment_status
                .parse::<PaymentStatus>()
                .map_err(|e| BookingError::Validation(e.to_string()))?;
            return match payment_status {
                PaymentStatus::Refunded => Ok(SessionTransition::Refund),
                PaymentStatus::Paid => Err(BookingError::Validation(
                    "Payments are recorded through POST /payments".to_string(),
                )),
                PaymentStatus::Pending => Err(BookingError::InvalidState(
                    "Payment status cannot return to pending".to_string(),
                )),
            };
        }

        let rating = req
            .rating
            .ok_or_else(|| {
                BookingError::Validation("rating is required with a review".to_string())
            })?;
        Ok(SessionTransition::AttachReview {
            rating: validate_rating(rating)?,
            review: req.review,
        })
    }
}

/// Tagged transition payload, e.g. `{"type": "recordPayment", "amount": 5.0}`.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransitionRequest {
    Confirm,
    Complete,
    Cancel,
    RecordPayment { amount: f64, currency: Option<String> },
    Refund,
    AttachReview { rating: i64, review: Option<String> },
}

impl TryFrom<TransitionRequest> for SessionTransition {
    type Error = BookingError;

    fn try_from(req: TransitionRequest) -> Result<Self, Self::Error> {
        Ok(match req {
            TransitionRequest::Confirm => SessionTransition::Confirm,
            TransitionRequest::Complete => SessionTransition::Complete,
            TransitionRequest::Cancel => SessionTransition::Cancel,
            TransitionRequest::RecordPayment { amount, currency } => {
                SessionTransition::RecordPayment { amount, currency }
            }
            TransitionRequest::Refund => SessionTransition::Refund,
            TransitionRequest::AttachReview { rating, review } => SessionTransition::AttachReview {
                rating: validate_rating(rating)?,
                review,
            },
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct TransitionResponse {
    pub session: SessionResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ReceiptResponse>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Book a lesson.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown lesson or user", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    let (lesson_id, learner_id, start_time) =
        match (req.lesson_id, req.learner_id, req.start_time) {
            (Some(l), Some(u), Some(t)) => (l, u, t),
            _ => {
                return Err(BookingError::Validation(
                    "lessonId, learnerId and startTime are required".to_string(),
                )
                .into())
            }
        };

    let session = state
        .bookings
        .create_session(NewSession {
            lesson_id,
            learner_user_id: learner_id,
            expert_user_id: req.expert_id,
            start_time,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// List sessions, newest start time first.
#[utoipa::path(
    get,
    path = "/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Matching sessions", body = [SessionResponse]),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListSessionsQuery>, QueryRejection>,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let query = query_params(query)?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<SessionStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let filter = SessionFilter { user_id: query.user_id, status };
    let sessions = state
        .bookings
        .list_sessions(&filter, Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// Fetch one session.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session", body = SessionResponse),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.bookings.get_session(&session_id).await?;
    Ok(Json(session.into()))
}

/// Change a session's status, refund it, or attach a review.
#[utoipa::path(
    put,
    path = "/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionResponse),
        (status = 400, description = "Illegal or ambiguous change", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn update_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    payload: Result<Json<UpdateSessionRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let transition = SessionTransition::try_from(json_body(payload)?)?;
    info!(session_id = %session_id, ?transition, "Updating session");
    let outcome = state.bookings.apply(&session_id, transition).await?;
    Ok(Json(outcome.session.into()))
}

/// Apply a tagged transition to a session.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/transitions",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Transition applied", body = TransitionResponse),
        (status = 400, description = "Illegal transition", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn apply_transition_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let transition = SessionTransition::try_from(json_body(payload)?)?;
    let outcome = state.bookings.apply(&session_id, transition).await?;
    Ok(Json(TransitionResponse {
        session: outcome.session.into(),
        receipt: outcome.receipt.map(ReceiptResponse::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_maps_to_single_transition() {
        let req = UpdateSessionRequest { status: Some("active".into()), ..Default::default() };
        assert_eq!(SessionTransition::try_from(req).unwrap(), SessionTransition::Confirm);

        let req = UpdateSessionRequest {
            payment_status: Some("refunded".into()),
            ..Default::default()
        };
        assert_eq!(SessionTransition::try_from(req).unwrap(), SessionTransition::Refund);

        let req = UpdateSessionRequest {
            rating: Some(5),
            review: Some("great".into()),
            ..Default::default()
        };
        assert_eq!(
            SessionTransition::try_from(req).unwrap(),
            SessionTransition::AttachReview { rating: 5, review: Some("great".into()) }
        );
    }

    #[test]
    fn update_request_rejects_mixed_or_empty_changes() {
        let mixed = UpdateSessionRequest {
            status: Some("confirmed".into()),
            payment_status: Some("refunded".into()),
            ..Default::default()
        };
        assert!(matches!(SessionTransition::try_from(mixed), Err(BookingError::Validation(_))));
        assert!(matches!(
            SessionTransition::try_from(UpdateSessionRequest::default()),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn update_request_rejects_backward_and_out_of_range() {
        let back = UpdateSessionRequest { status: Some("pending".into()), ..Default::default() };
        assert!(matches!(SessionTransition::try_from(back), Err(BookingError::InvalidState(_))));

        let review_only = UpdateSessionRequest {
            review: Some("nice".into()),
            ..Default::default()
        };
        assert!(matches!(
            SessionTransition::try_from(review_only),
            Err(BookingError::Validation(_))
        ));

        let too_high = UpdateSessionRequest { rating: Some(9), ..Default::default() };
        assert!(matches!(SessionTransition::try_from(too_high), Err(BookingError::Validation(_))));
    }

    #[test]
    fn tagged_payload_deserializes() {
        let req: TransitionRequest =
            serde_json::from_str(r#"{"type":"recordPayment","amount":5.0,"currency":"EUR"}"#)
                .unwrap();
        assert_eq!(
            SessionTransition::try_from(req).unwrap(),
            SessionTransition::RecordPayment { amount: 5.0, currency: Some("EUR".into()) }
        );
        let req: TransitionRequest = serde_json::from_str(r#"{"type":"cancel"}"#).unwrap();
        assert_eq!(SessionTransition::try_from(req).unwrap(), SessionTransition::Cancel);
    }
}
