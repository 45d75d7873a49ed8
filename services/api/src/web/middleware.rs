//! services/api/src/web/middleware.rs
//!
//! Session middleware. `require_auth` protects the user-scoped API routes,
//! `session_guard` protects the HTML pages by redirecting.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The value of the `session` cookie, if the request carries one.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// The user owning the request's live session. Any lookup failure counts as no session.
async fn session_user(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let auth_session_id = session_cookie(headers)?;
    match state.db.validate_auth_session(auth_session_id).await {
        Ok(user_id) => Some(user_id),
        Err(e) => {
            debug!("Session lookup failed: {}", e);
            None
        }
    }
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, answers with a 401 envelope.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = session_user(&state, req.headers())
        .await
        .ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Redirects page requests according to the session guard rules.
pub async fn session_guard(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = session_user(&state, req.headers()).await;
    let decision = state.guard.decide(req.uri().path(), user_id.is_some());
    if let Some(location) = state.guard.location(decision) {
        debug!(path = %req.uri().path(), location, "Session guard redirect");
        return Redirect::temporary(location).into_response();
    }
    if let Some(user_id) = user_id {
        req.extensions_mut().insert(user_id);
    }
    next.run(req).await
}
