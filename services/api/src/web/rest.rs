//! services/api/src/web/rest.rs
//!
//! The response envelope shared by every JSON endpoint, the extractors that
//! turn malformed input into that envelope, and the master definition for the
//! OpenAPI specification.

use axum::{
    extract::{FromRequest, FromRequestParts},
    Json,
};
use hadith_core::domain::{
    Achievement, ChatHadith, ChatMessage, ChatRole, DailyChallenge, Difficulty, Favorite, Hadith,
    NewQuizResult, Profile, ProfileSummary, ProfileUpdate, Progress, ProgressStatus, QuizQuestion,
    QuizResult,
};
use serde::Serialize;
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::web::{activity, ai, auth, chat, hadiths, profile, webhook};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        hadiths::search_handler,
        hadiths::backfill_embedding_handler,
        hadiths::get_hadith_handler,
        ai::ai_handler,
        chat::chat_handler,
        chat::chat_stream_handler,
        profile::get_profile_handler,
        profile::upsert_profile_handler,
        profile::update_profile_handler,
        activity::record_progress_handler,
        activity::list_favorites_handler,
        activity::add_favorite_handler,
        activity::remove_favorite_handler,
        activity::save_quiz_result_handler,
        activity::list_achievements_handler,
        webhook::clerk_webhook_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
    ),
    components(
        schemas(
            Hadith, Profile, ProfileSummary, ProfileUpdate, Progress, ProgressStatus, Favorite,
            NewQuizResult, QuizResult, Achievement, QuizQuestion, DailyChallenge, Difficulty,
            ChatMessage, ChatRole, ChatHadith,
            hadiths::BackfillRequest,
            ai::AiRequest,
            chat::ChatRequest, chat::ChatResponse,
            profile::UpsertProfileRequest,
            activity::ProgressRequest, activity::FavoriteRequest,
            auth::SignupRequest, auth::LoginRequest, auth::AuthResponse,
        )
    ),
    tags(
        (name = "Hadith Study API", description = "Search, AI study aids and learning progress for hadith collections.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Response Envelope
//=========================================================================================

/// `{success, data?, error?, message?}` as returned by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    /// A success without a payload.
    pub fn acknowledged(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
        }
    }
}

/// Shorthand for a handler's success body.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

//=========================================================================================
// Extractors
//=========================================================================================

/// `Json` whose rejection is rendered as a 400 envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Form` whose rejection is rendered as a 400 envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ApiForm<T>(pub T);

/// `Query` whose rejection is rendered as a 400 envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

//=========================================================================================
// Liveness
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> Json<ApiResponse<()>> {
    Json(ApiResponse::acknowledged("ok"))
}
