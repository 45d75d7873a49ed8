//! services/api/src/web/pages.rs
//!
//! The few server-rendered pages. They sit behind `session_guard`, so the
//! dashboard always runs with a user id in the request extensions.

use axum::{extract::State, response::Html, Extension};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::web::state::AppState;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{} | Hadith Study</title></head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    ))
}

pub async fn landing_page() -> Html<String> {
    page(
        "Welcome",
        "<h1>Hadith Study</h1>\n<p>Read, search and discuss the hadith collections.</p>\n\
         <p><a href=\"/sign-in\">Sign in</a> or <a href=\"/sign-up\">create an account</a>.</p>",
    )
}

pub async fn sign_in_page() -> Html<String> {
    page(
        "Sign in",
        "<h1>Sign in</h1>\n<form method=\"post\" action=\"/sign-in\">\n\
         <input name=\"email\" type=\"email\"><input name=\"password\" type=\"password\">\n\
         <button>Sign in</button>\n</form>",
    )
}

pub async fn sign_up_page() -> Html<String> {
    page(
        "Sign up",
        "<h1>Create an account</h1>\n<form method=\"post\" action=\"/sign-up\">\n\
         <input name=\"email\" type=\"email\"><input name=\"password\" type=\"password\">\n\
         <button>Sign up</button>\n</form>",
    )
}

/// Reads the profile, creating it on the first visit.
pub async fn dashboard_page(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
) -> ApiResult<Html<String>> {
    let profile = state.db.ensure_profile(&user_id, None).await?;
    let name = profile.username.as_deref().unwrap_or("friend");
    let body = format!(
        "<h1>Assalamu alaykum, {}</h1>\n<ul>\n\
         <li>Hadiths read: {}</li>\n<li>Quizzes completed: {}</li>\n\
         <li>Current streak: {}</li>\n<li>Points: {}</li>\n</ul>",
        escape(name),
        profile.hadiths_read,
        profile.quizzes_completed,
        profile.current_streak,
        profile.points
    );
    Ok(page("Dashboard", &body))
}
