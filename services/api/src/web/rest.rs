//! services/api/src/web/rest.rs
//!
//! Assembles the REST router and holds the master definition for the OpenAPI
//! specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use crate::web::{lessons, notifications, payments, sessions, users};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        sessions::create_session_handler,
        sessions::list_sessions_handler,
        sessions::get_session_handler,
        sessions::update_session_handler,
        sessions::apply_transition_handler,
        payments::record_payment_handler,
        payments::payment_status_handler,
        users::upsert_user_handler,
        users::list_users_handler,
        users::get_user_handler,
        users::update_user_handler,
        users::upsert_expert_profile_handler,
        users::get_expert_profile_handler,
        lessons::create_lesson_handler,
        lessons::list_lessons_handler,
        lessons::get_lesson_handler,
        lessons::update_lesson_handler,
        lessons::discover_handler,
        notifications::list_notifications_handler,
        notifications::mark_notification_handler,
        notifications::delete_notification_handler,
    ),
    components(
        schemas(ErrorBody, HealthResponse)
    ),
    tags(
        (name = "sessions", description = "Booking lifecycle of micro-lesson sessions."),
        (name = "payments", description = "Simulated payments for sessions."),
        (name = "users", description = "Users and expert profiles."),
        (name = "lessons", description = "Micro-lesson catalog and discovery."),
        (name = "notifications", description = "Notifications produced by session transitions.")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string() })
}

//=========================================================================================
// Router
//=========================================================================================

/// Builds every API route over the shared state, with CORS and request tracing.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/sessions",
            post(sessions::create_session_handler).get(sessions::list_sessions_handler),
        )
        .route(
            "/sessions/{session_id}",
            get(sessions::get_session_handler).put(sessions::update_session_handler),
        )
        .route(
            "/sessions/{session_id}/transitions",
            post(sessions::apply_transition_handler),
        )
        .route("/payments", post(payments::record_payment_handler))
        .route("/payments/{session_id}", get(payments::payment_status_handler))
        .route(
            "/users",
            post(users::upsert_user_handler).get(users::list_users_handler),
        )
        .route(
            "/users/{user_id}",
            get(users::get_user_handler).put(users::update_user_handler),
        )
        .route(
            "/users/{user_id}/expert-profile",
            put(users::upsert_expert_profile_handler).get(users::get_expert_profile_handler),
        )
        .route(
            "/lessons",
            post(lessons::create_lesson_handler).get(lessons::list_lessons_handler),
        )
        .route(
            "/lessons/{lesson_id}",
            get(lessons::get_lesson_handler).put(lessons::update_lesson_handler),
        )
        .route("/discover", get(lessons::discover_handler))
        .route("/notifications", get(notifications::list_notifications_handler))
        .route(
            "/notifications/{notification_id}",
            put(notifications::mark_notification_handler)
                .delete(notifications::delete_notification_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    Ok(router)
}
