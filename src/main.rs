//! Learning Buddy · Progression Backend
//!
//! - Axum HTTP API (auth, challenges, learning paths, gamification, analytics, tutor chat)
//! - Optional OpenAI integration (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   TOKEN_SECRET        : signing secret for bearer tokens
//!   OPENAI_API_KEY      : enables OpenAI integration if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_MODEL        : default "gpt-4o-mini"
//!   CONTENT_CONFIG_PATH : path to TOML config (prompts + challenge/badge bank)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use buddy_backend::routes::build_router;
use buddy_backend::store::AppState;
use buddy_backend::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (in-memory stores, OpenAI client, prompts).
  let state = AppState::new();

  // HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "buddy_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
