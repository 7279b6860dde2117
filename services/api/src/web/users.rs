//! services/api/src/web/users.rs
//!
//! Users and their expert profiles.

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{ExpertProfileResponse, LocationDto, UserResponse};
use crate::web::state::AppState;
use crate::web::{json_body, query_params};
use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use skillshake_core::catalog::{ExpertProfileInput, UserPatch};
use skillshake_core::domain::{tag_set, Availability, NewUser, Page};
use skillshake_core::error::BookingError;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub user_id: Option<String>,
    pub farcaster_id: Option<String>,
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub rating: Option<f64>,
    pub location: Option<LocationDto>,
}

/// Partial update. Omitted fields keep their stored values.
#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub farcaster_id: Option<String>,
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub rating: Option<f64>,
    pub location: Option<LocationDto>,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExpertProfileRequest {
    #[serde(default)]
    pub expertise: Vec<String>,
    /// `available`, `busy` or `offline`.
    pub availability: Option<String>,
    pub hourly_rate: f64,
    pub rating: Option<f64>,
}

#[derive(Deserialize, IntoParams, Debug)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Restrict the result to the user holding this Farcaster id.
    pub farcaster_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Register a user. Re-posting an existing `userId` replaces `username` and
/// only the other fields that are present; `rating` is kept unless supplied.
#[utoipa::path(
    post,
    path = "/users",
    request_body = UpsertUserRequest,
    responses(
        (status = 201, description = "User saved", body = UserResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn upsert_user_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpsertUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(payload)?;
    let (id, username) = match (req.user_id, req.username) {
        (Some(id), Some(username)) => (id, username),
        _ => {
            return Err(
                BookingError::Validation("userId and username are required".to_string()).into(),
            )
        }
    };
    let user = state
        .catalog
        .upsert_user(NewUser {
            id,
            farcaster_id: req.farcaster_id,
            username,
            profile_picture_url: req.profile_picture_url,
            bio: req.bio,
            skills: req.skills.map(tag_set),
            rating: req.rating,
            location: req.location.map(Into::into),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// List users, oldest first, or look one up by `farcasterId`.
#[utoipa::path(
    get,
    path = "/users",
    params(ListUsersQuery),
    responses((status = 200, description = "Users", body = [UserResponse])),
    tag = "users"
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let query = query_params(query)?;
    if let Some(farcaster_id) = query.farcaster_id {
        return match state.catalog.find_user_by_farcaster_id(&farcaster_id).await {
            Ok(user) => Ok(Json(vec![UserResponse::from(user)])),
            Err(BookingError::NotFound(_)) => Ok(Json(Vec::new())),
            Err(e) => Err(e.into()),
        };
    }
    let users = state
        .catalog
        .list_users(Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Fetch a user together with their expert profile, if any.
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.catalog.get_user(&user_id).await?;
    let expert_profile = match state.catalog.get_expert_profile(&user_id).await {
        Ok(profile) => Some(ExpertProfileResponse::from(profile)),
        Err(BookingError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let mut response = UserResponse::from(user);
    response.expert_profile = expert_profile;
    Ok(Json(response))
}

/// Update the supplied user fields, including `rating`.
#[utoipa::path(
    put,
    path = "/users/{user_id}",
    params(("user_id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid fields or farcasterId taken", body = ErrorBody),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let req = json_body(payload)?;
    let patch = UserPatch {
        farcaster_id: req.farcaster_id,
        username: req.username,
        profile_picture_url: req.profile_picture_url,
        bio: req.bio,
        skills: req.skills.map(tag_set),
        rating: req.rating,
        location: req.location.map(Into::into),
    };
    let user = state.catalog.update_user(&user_id, patch).await?;
    Ok(Json(user.into()))
}

/// Create or replace a user's expert profile.
#[utoipa::path(
    put,
    path = "/users/{user_id}/expert-profile",
    params(("user_id" = String, Path, description = "User id")),
    request_body = ExpertProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = ExpertProfileResponse),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown user", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn upsert_expert_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<ExpertProfileRequest>, JsonRejection>,
) -> Result<Json<ExpertProfileResponse>, ApiError> {
    let req = json_body(payload)?;
    let availability = req
        .availability
        .as_deref()
        .map(str::parse::<Availability>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .unwrap_or(Availability::Available);
    let profile = state
        .catalog
        .upsert_expert_profile(
            &user_id,
            ExpertProfileInput {
                expertise: tag_set(req.expertise),
                availability,
                hourly_rate: req.hourly_rate,
                rating: req.rating,
            },
        )
        .await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/expert-profile",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The expert profile", body = ExpertProfileResponse),
        (status = 404, description = "No expert profile", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn get_expert_profile_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ExpertProfileResponse>, ApiError> {
    let profile = state.catalog.get_expert_profile(&user_id).await?;
    Ok(Json(profile.into()))
}
