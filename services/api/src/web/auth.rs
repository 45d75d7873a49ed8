//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use hadith_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::middleware::session_cookie;
use crate::web::rest::{ok, ApiForm, ApiJson, ApiResponse};
use crate::web::state::AppState;

const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: String,
    pub email: String,
}

//=========================================================================================
// Session Helpers
//=========================================================================================

/// Stores a fresh 30-day session and returns its `Set-Cookie` value.
async fn issue_session(state: &AppState, user_id: &str) -> ApiResult<String> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await?;

    Ok(format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    ))
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request or email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let (response, cookie) = register(&state, req).await?;
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], ok(response)))
}

/// POST /sign-up - The sign-up page's form; lands on the dashboard.
pub async fn signup_form_handler(
    State(state): State<Arc<AppState>>,
    ApiForm(req): ApiForm<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let (_, cookie) = register(&state, req).await?;
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/dashboard")))
}

async fn register(state: &AppState, req: SignupRequest) -> ApiResult<(AuthResponse, String)> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state.db.create_user_with_email(&email, &password_hash).await?;

    // Local accounts get their profile right away, named after the email.
    let username = email.split('@').next().filter(|s| !s.is_empty());
    state.db.ensure_profile(&user.user_id, username).await?;

    let cookie = issue_session(state, &user.user_id).await?;
    info!(user_id = %user.user_id, "User signed up");

    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email.unwrap_or_default(),
    };
    Ok((response, cookie))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (response, cookie) = authenticate(&state, req).await?;
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], ok(response)))
}

/// POST /sign-in - The sign-in page's form; lands on the dashboard.
pub async fn login_form_handler(
    State(state): State<Arc<AppState>>,
    ApiForm(req): ApiForm<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (_, cookie) = authenticate(&state, req).await?;
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/dashboard")))
}

async fn authenticate(state: &AppState, req: LoginRequest) -> ApiResult<(AuthResponse, String)> {
    let email = req.email.trim().to_lowercase();
    let user_creds = state.db.get_user_by_email(&email).await.map_err(|e| match e {
        PortError::NotFound(_) => ApiError::Unauthorized,
        other => ApiError::Port(other),
    })?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let cookie = issue_session(state, &user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };
    Ok((response, cookie))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let auth_session_id = session_cookie(&headers).ok_or(ApiError::Unauthorized)?;
    state.db.delete_auth_session(auth_session_id).await?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(ApiResponse::acknowledged("Logged out")),
    ))
}
