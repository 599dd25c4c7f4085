//! Wire DTOs shared by the HTTP handlers, plus the `{success, message, data}`
//! response envelope every endpoint speaks.

use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::analytics::LeaderboardMetric;
use crate::domain::challenge::{Category, Difficulty};
use crate::domain::chat::ContextKind;
use crate::domain::user::Profile;

/// Success envelope with a payload.
pub fn ok<T: serde::Serialize>(data: T) -> Json<Value> {
  Json(json!({ "success": true, "data": data }))
}

/// Success envelope with a human-readable message and a payload.
pub fn ok_msg<T: serde::Serialize>(message: &str, data: T) -> Json<Value> {
  Json(json!({ "success": true, "message": message, "data": data }))
}

// --- auth ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIn {
  pub username: String,
  pub email: String,
  pub password: String,
  #[serde(default)]
  pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginIn {
  /// Username or email.
  pub identifier: String,
  pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateIn {
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub bio: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordIn {
  pub current_password: String,
  pub new_password: String,
}

/// Partial settings update; absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsIn {
  #[serde(default)]
  pub show_in_leaderboard: Option<bool>,
  #[serde(default)]
  pub daily_goal_minutes: Option<u32>,
  #[serde(default)]
  pub email_notifications: Option<bool>,
  #[serde(default)]
  pub achievement_alerts: Option<bool>,
}

// --- challenges & paths ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeQuery {
  #[serde(default)]
  pub category: Option<Category>,
  #[serde(default)]
  pub difficulty: Option<Difficulty>,
  #[serde(default)]
  pub search: Option<String>,
}

// --- gamification & analytics ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
  #[serde(default)]
  pub metric: LeaderboardMetric,
  #[serde(default)]
  pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningQuery {
  /// Window size in days; defaults to 30.
  #[serde(default)]
  pub days: Option<i64>,
}

// --- tutor chat ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStartIn {
  #[serde(default)]
  pub context_kind: ContextKind,
  /// Challenge or path id the session is about, if any.
  #[serde(default)]
  pub context_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageIn {
  pub message: String,
  /// Request a chunked streaming reply instead of a buffered one.
  #[serde(default)]
  pub stream: bool,
}
