pub mod activity;
pub mod ai;
pub mod auth;
pub mod chat;
pub mod hadiths;
pub mod middleware;
pub mod pages;
pub mod profile;
pub mod rest;
pub mod state;
pub mod webhook;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use middleware::{require_auth, session_guard};
use state::AppState;

/// Builds every route of the service around the shared state.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route(
            "/api/hadiths/search",
            get(hadiths::search_handler).post(hadiths::backfill_embedding_handler),
        )
        .route("/api/hadiths/{id}", get(hadiths::get_hadith_handler))
        .route("/api/ai", post(ai::ai_handler))
        .route("/api/chat", post(chat::chat_handler))
        .route("/api/chat/stream", post(chat::chat_stream_handler))
        .route("/api/webhook/clerk", post(webhook::clerk_webhook_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/api/user/profile",
            get(profile::get_profile_handler)
                .post(profile::upsert_profile_handler)
                .patch(profile::update_profile_handler),
        )
        .route("/api/progress", post(activity::record_progress_handler))
        .route(
            "/api/favorites",
            get(activity::list_favorites_handler).post(activity::add_favorite_handler),
        )
        .route(
            "/api/favorites/{hadithId}",
            delete(activity::remove_favorite_handler),
        )
        .route("/api/quiz-results", post(activity::save_quiz_result_handler))
        .route("/api/achievements", get(activity::list_achievements_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Pages (session guard redirects)
    let page_routes = Router::new()
        .route("/", get(pages::landing_page))
        .route("/sign-in", get(pages::sign_in_page).post(auth::login_form_handler))
        .route("/sign-up", get(pages::sign_up_page).post(auth::signup_form_handler))
        .route("/dashboard", get(pages::dashboard_page))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            session_guard,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(page_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
