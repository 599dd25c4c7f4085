//! Router assembly: REST API, static files, CORS, and HTTP tracing.

use axum::{
  routing::{delete, get, post, put},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::store::AppState;

pub mod ai;
pub mod analytics;
pub mod auth;
pub mod challenges;
pub mod gamification;
pub mod paths;

/// Build the application router with:
/// - REST API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: AppState) -> Router {
  // Static files with SPA fallback
  let static_service = ServeDir::new("./static")
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new("./static/index.html"));

  Router::new()
    .route("/api/v1/health", get(health))
    // auth & account
    .route("/api/v1/auth/register", post(auth::register))
    .route("/api/v1/auth/login", post(auth::login))
    .route("/api/v1/auth/profile", get(auth::get_profile).put(auth::update_profile))
    .route("/api/v1/auth/change-password", post(auth::change_password))
    .route("/api/v1/auth/settings", put(auth::update_settings))
    .route("/api/v1/auth/account", delete(auth::delete_account))
    // challenges & attempts
    .route("/api/v1/challenges", get(challenges::list))
    .route("/api/v1/challenges/:id", get(challenges::get_one))
    .route("/api/v1/challenges/:id/start", post(challenges::start))
    .route("/api/v1/challenges/:id/submit", post(challenges::submit))
    .route("/api/v1/challenges/:id/abandon", post(challenges::abandon))
    // learning paths
    .route("/api/v1/learning-paths", get(paths::list))
    .route("/api/v1/learning-paths/:id", get(paths::get_one))
    .route("/api/v1/learning-paths/:id/enroll", post(paths::enroll))
    .route("/api/v1/learning-paths/:id/progress", get(paths::progress))
    .route("/api/v1/learning-paths/:id/steps/:n/complete", post(paths::complete_step))
    // gamification
    .route("/api/v1/gamification/badges", get(gamification::badges))
    .route("/api/v1/gamification/leaderboard", get(gamification::leaderboard))
    .route("/api/v1/gamification/check-badges", post(gamification::check_badges))
    // analytics
    .route("/api/v1/analytics/dashboard", get(analytics::dashboard))
    .route("/api/v1/analytics/learning", get(analytics::learning))
    .route("/api/v1/analytics/system", get(analytics::system))
    // tutor chat
    .route("/api/v1/ai/chat/start", post(ai::start_session))
    .route("/api/v1/ai/chat/:session_id", get(ai::get_session))
    .route("/api/v1/ai/chat/:session_id/message", post(ai::send_message))
    // State + CORS + HTTP tracing
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    // Frontend fallback
    .fallback_service(static_service)
}

async fn health() -> axum::Json<serde_json::Value> {
  axum::Json(serde_json::json!({ "ok": true }))
}
