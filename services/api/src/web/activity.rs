//! services/api/src/web/activity.rs
//!
//! Learning activity of the signed-in user: reading progress, favorites, quiz
//! results and achievements. Every write that earns points also bumps the
//! profile counters.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hadith_core::domain::{
    Achievement, Favorite, Hadith, NewQuizResult, Progress, ProgressStatus, QuizResult,
    StatsDelta, POINTS_PER_HADITH,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::rest::{ok, ApiJson, ApiResponse};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub hadith_id: Uuid,
    pub status: ProgressStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub hadith_id: Uuid,
}

//=========================================================================================
// Progress
//=========================================================================================

/// Record reading progress on one hadith.
#[utoipa::path(
    post,
    path = "/api/progress",
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Stored progress row", body = Progress),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Unknown hadith")
    )
)]
pub async fn record_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    ApiJson(req): ApiJson<ProgressRequest>,
) -> ApiResult<Json<ApiResponse<Progress>>> {
    state.db.ensure_profile(&user_id, None).await?;
    let update = state
        .db
        .record_progress(&user_id, req.hadith_id, req.status)
        .await?;

    if update.newly_completed() {
        let delta = StatsDelta {
            hadiths_read: 1,
            points: POINTS_PER_HADITH,
            ..StatsDelta::default()
        };
        let profile = state.db.apply_stats(&user_id, delta).await?;
        info!(%user_id, hadith_id = %req.hadith_id, points = profile.points, "Hadith completed");
    }
    Ok(ok(update.progress))
}

//=========================================================================================
// Favorites
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/favorites",
    responses(
        (status = 200, description = "Favorited hadiths, newest first", body = [Hadith]),
        (status = 401, description = "No valid session")
    )
)]
pub async fn list_favorites_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
) -> ApiResult<Json<ApiResponse<Vec<Hadith>>>> {
    let hadiths = state.db.favorite_hadiths(&user_id).await?;
    Ok(ok(hadiths))
}

#[utoipa::path(
    post,
    path = "/api/favorites",
    request_body = FavoriteRequest,
    responses(
        (status = 201, description = "Favorite stored (idempotent)", body = Favorite),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Unknown hadith")
    )
)]
pub async fn add_favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    ApiJson(req): ApiJson<FavoriteRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Favorite>>)> {
    state.db.ensure_profile(&user_id, None).await?;
    let favorite = state.db.add_favorite(&user_id, req.hadith_id).await?;
    Ok((StatusCode::CREATED, ok(favorite)))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{hadithId}",
    params(("hadithId" = Uuid, Path, description = "Hadith id")),
    responses(
        (status = 200, description = "Favorite removed"),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Not a favorite")
    )
)]
pub async fn remove_favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    Path(hadith_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.db.remove_favorite(&user_id, hadith_id).await?;
    Ok(Json(ApiResponse::acknowledged("Favorite removed")))
}

//=========================================================================================
// Quiz Results and Achievements
//=========================================================================================

/// Store a finished quiz; its score is added to the profile points.
#[utoipa::path(
    post,
    path = "/api/quiz-results",
    request_body = NewQuizResult,
    responses(
        (status = 201, description = "Stored result", body = QuizResult),
        (status = 400, description = "Score or time out of range"),
        (status = 401, description = "No valid session")
    )
)]
pub async fn save_quiz_result_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    ApiJson(result): ApiJson<NewQuizResult>,
) -> ApiResult<(StatusCode, Json<ApiResponse<QuizResult>>)> {
    result.validate()?;
    state.db.ensure_profile(&user_id, None).await?;
    let stored = state.db.save_quiz_result(&user_id, result).await?;
    info!(%user_id, score = stored.score, "Quiz result stored");
    Ok((StatusCode::CREATED, ok(stored)))
}

#[utoipa::path(
    get,
    path = "/api/achievements",
    responses(
        (status = 200, description = "Earned achievements, newest first", body = [Achievement]),
        (status = 401, description = "No valid session")
    )
)]
pub async fn list_achievements_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
) -> ApiResult<Json<ApiResponse<Vec<Achievement>>>> {
    let achievements = state.db.list_achievements(&user_id).await?;
    Ok(ok(achievements))
}
