//! services/api/src/web/profile.rs
//!
//! Profile endpoints for the signed-in user. The user id is placed in the
//! request extensions by `require_auth`.

use axum::{extract::State, Extension, Json};
use hadith_core::domain::{Profile, ProfileSummary, ProfileUpdate};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::web::rest::{ok, ApiJson, ApiResponse};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpsertProfileRequest {
    pub username: Option<String>,
}

/// Get the caller's profile, creating it on first visit.
#[utoipa::path(
    get,
    path = "/api/user/profile",
    responses(
        (status = 200, description = "Profile with related row counts", body = ProfileSummary),
        (status = 401, description = "No valid session")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
) -> ApiResult<Json<ApiResponse<ProfileSummary>>> {
    state.db.ensure_profile(&user_id, None).await?;
    let summary = state.db.get_profile_summary(&user_id).await?;
    Ok(ok(summary))
}

/// Create the caller's profile or replace its username.
#[utoipa::path(
    post,
    path = "/api/user/profile",
    request_body = UpsertProfileRequest,
    responses(
        (status = 200, description = "Stored profile", body = Profile),
        (status = 401, description = "No valid session")
    )
)]
pub async fn upsert_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    ApiJson(req): ApiJson<UpsertProfileRequest>,
) -> ApiResult<Json<ApiResponse<Profile>>> {
    let profile = state
        .db
        .upsert_profile(&user_id, req.username.as_deref())
        .await?;
    info!(user_id = %profile.id, "Profile upserted");
    Ok(Json(
        ApiResponse::success(profile).with_message("Profile updated successfully"),
    ))
}

/// Change some fields of the caller's existing profile.
#[utoipa::path(
    patch,
    path = "/api/user/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 401, description = "No valid session"),
        (status = 404, description = "No profile yet")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<ApiResponse<Profile>>> {
    let profile = state.db.update_profile(&user_id, &update).await?;
    Ok(Json(
        ApiResponse::success(profile).with_message("Profile updated successfully"),
    ))
}
