//! Learning Buddy · Progression Backend
//!
//! Gamified e-learning API: accounts, challenge attempts, XP/levels/streaks,
//! badges, learning paths, analytics, and an optional OpenAI-backed tutor.
//! Library crate so integration tests can drive the router directly; the
//! binary in `main.rs` is a thin wrapper.

pub mod analytics;
pub mod auth;
pub mod badges;
pub mod config;
pub mod domain;
pub mod error;
pub mod openai;
pub mod progression;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod store;
pub mod telemetry;
pub mod util;
