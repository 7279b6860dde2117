//! services/api/src/web/notifications.rs
//!
//! Read access to a user's notifications. Notifications are only ever created
//! by lifecycle transitions, so there is no create endpoint.

use crate::error::ApiError;
use crate::web::dto::{MessageResponse, NotificationResponse};
use crate::web::state::AppState;
use crate::web::{json_body, query_params};
use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use skillshake_core::domain::Page;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, Debug)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListNotificationsQuery {
    pub user_id: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MarkNotificationRequest {
    /// Defaults to `true`.
    #[serde(alias = "readStatus")]
    pub read: Option<bool>,
}

/// List a user's notifications, newest first.
#[utoipa::path(
    get,
    path = "/notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Notifications", body = [NotificationResponse]),
        (status = 400, description = "userId missing", body = crate::error::ErrorBody),
    ),
    tag = "notifications"
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListNotificationsQuery>, QueryRejection>,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let query = query_params(query)?;
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;
    let notifications = state
        .db
        .list_notifications(&user_id, query.unread_only, Page::new(query.limit, query.offset))
        .await
        .map_err(skillshake_core::BookingError::from)?;
    Ok(Json(notifications.into_iter().map(NotificationResponse::from).collect()))
}

/// Mark a notification read (or unread).
#[utoipa::path(
    put,
    path = "/notifications/{notification_id}",
    params(("notification_id" = String, Path, description = "Notification id")),
    request_body = MarkNotificationRequest,
    responses(
        (status = 200, description = "Updated notification", body = NotificationResponse),
        (status = 404, description = "Unknown notification", body = crate::error::ErrorBody),
    ),
    tag = "notifications"
)]
pub async fn mark_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<String>,
    payload: Result<Json<MarkNotificationRequest>, JsonRejection>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let req = json_body(payload)?;
    let notification = state
        .db
        .set_notification_read(&notification_id, req.read.unwrap_or(true))
        .await
        .map_err(skillshake_core::BookingError::from)?;
    Ok(Json(notification.into()))
}

#[utoipa::path(
    delete,
    path = "/notifications/{notification_id}",
    params(("notification_id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification deleted", body = MessageResponse),
        (status = 404, description = "Unknown notification", body = crate::error::ErrorBody),
    ),
    tag = "notifications"
)]
pub async fn delete_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .delete_notification(&notification_id)
        .await
        .map_err(skillshake_core::BookingError::from)?;
    Ok(Json(MessageResponse {
        message: "Notification deleted successfully".to_string(),
    }))
}
