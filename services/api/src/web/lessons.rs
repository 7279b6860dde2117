//! services/api/src/web/lessons.rs
//!
//! Micro-lesson catalog and the "shake to discover" endpoint.

use crate::error::ApiError;
use crate::web::dto::LessonResponse;
use crate::web::state::AppState;
use crate::web::{json_body, query_params};
use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use skillshake_core::catalog::{LessonPatch, NewLesson};
use skillshake_core::domain::{LessonFilter, LessonType, Page};
use skillshake_core::error::BookingError;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    pub expert_user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    /// `live`, `recorded` or `inperson`.
    #[serde(rename = "type")]
    pub lesson_type: Option<String>,
    pub price: Option<f64>,
    pub location_tag: Option<String>,
    pub is_live: Option<bool>,
    pub recording_url: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    #[serde(rename = "type")]
    pub lesson_type: Option<String>,
    pub price: Option<f64>,
    pub location_tag: Option<String>,
    pub is_live: Option<bool>,
    pub recording_url: Option<String>,
}

#[derive(Deserialize, IntoParams, Debug)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListLessonsQuery {
    pub expert_user_id: Option<String>,
    #[serde(rename = "type")]
    pub lesson_type: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct DiscoverQuery {
    /// How many lessons to draw (1 to 10, default 1).
    pub count: Option<usize>,
}

fn parse_lesson_type(value: Option<String>) -> Result<Option<LessonType>, ApiError> {
    value
        .as_deref()
        .map(str::parse::<LessonType>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Publish a lesson for an expert.
#[utoipa::path(
    post,
    path = "/lessons",
    request_body = CreateLessonRequest,
    responses(
        (status = 201, description = "Lesson created", body = LessonResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ErrorBody),
        (status = 404, description = "Expert profile not found", body = crate::error::ErrorBody),
    ),
    tag = "lessons"
)]
pub async fn create_lesson_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateLessonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    let (expert_user_id, title, description) =
        match (req.expert_user_id, req.title, req.description) {
            (Some(e), Some(t), Some(d)) => (e, t, d),
            _ => {
                return Err(BookingError::Validation(
                    "expertUserId, title and description are required".to_string(),
                )
                .into())
            }
        };
    let lesson = state
        .catalog
        .create_lesson(NewLesson {
            expert_user_id,
            title,
            description,
            duration_minutes: req.duration_minutes,
            lesson_type: parse_lesson_type(req.lesson_type)?,
            price: req.price,
            location_tag: req.location_tag,
            is_live: req.is_live,
            recording_url: req.recording_url,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(LessonResponse::from(lesson))))
}

/// List lessons, newest first.
#[utoipa::path(
    get,
    path = "/lessons",
    params(ListLessonsQuery),
    responses(
        (status = 200, description = "Lessons", body = [LessonResponse]),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorBody),
    ),
    tag = "lessons"
)]
pub async fn list_lessons_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListLessonsQuery>, QueryRejection>,
) -> Result<Json<Vec<LessonResponse>>, ApiError> {
    let query = query_params(query)?;
    let filter = LessonFilter {
        expert_user_id: query.expert_user_id,
        lesson_type: parse_lesson_type(query.lesson_type)?,
    };
    let lessons = state
        .catalog
        .list_lessons(&filter, Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(lessons.into_iter().map(LessonResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}",
    params(("lesson_id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "The lesson", body = LessonResponse),
        (status = 404, description = "Unknown lesson", body = crate::error::ErrorBody),
    ),
    tag = "lessons"
)]
pub async fn get_lesson_handler(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> Result<Json<LessonResponse>, ApiError> {
    let lesson = state.catalog.get_lesson(&lesson_id).await?;
    Ok(Json(lesson.into()))
}

/// Update the supplied lesson fields.
#[utoipa::path(
    put,
    path = "/lessons/{lesson_id}",
    params(("lesson_id" = String, Path, description = "Lesson id")),
    request_body = UpdateLessonRequest,
    responses(
        (status = 200, description = "Updated lesson", body = LessonResponse),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown lesson", body = crate::error::ErrorBody),
    ),
    tag = "lessons"
)]
pub async fn update_lesson_handler(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
    payload: Result<Json<UpdateLessonRequest>, JsonRejection>,
) -> Result<Json<LessonResponse>, ApiError> {
    let req = json_body(payload)?;
    let patch = LessonPatch {
        title: req.title,
        description: req.description,
        duration_minutes: req.duration_minutes,
        lesson_type: parse_lesson_type(req.lesson_type)?,
        price: req.price,
        location_tag: req.location_tag,
        is_live: req.is_live,
        recording_url: req.recording_url,
    };
    let lesson = state.catalog.update_lesson(&lesson_id, patch).await?;
    Ok(Json(lesson.into()))
}

/// Draw random lessons, as triggered by a shake on the client.
#[utoipa::path(
    get,
    path = "/discover",
    params(DiscoverQuery),
    responses(
        (status = 200, description = "Randomly chosen lessons", body = [LessonResponse]),
        (status = 404, description = "No lessons available", body = crate::error::ErrorBody),
    ),
    tag = "lessons"
)]
pub async fn discover_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DiscoverQuery>, QueryRejection>,
) -> Result<Json<Vec<LessonResponse>>, ApiError> {
    let query = query_params(query)?;
    let lessons = state.discovery.discover(query.count.unwrap_or(1)).await?;
    Ok(Json(lessons.into_iter().map(LessonResponse::from).collect()))
}
