//! Account endpoints: registration, login, profile, settings, deletion.
//! Thin wrappers; validation and the happy path live right here, everything
//! stateful goes through the shared `Db` guard.

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::error::ApiError;
use crate::protocol::*;
use crate::store::AppState;

fn validate_registration(body: &RegisterIn) -> Result<(), ApiError> {
  if body.username.trim().len() < 3 {
    return Err(ApiError::Validation("Username must be at least 3 characters".into()));
  }
  if !body.email.contains('@') {
    return Err(ApiError::Validation("A valid email address is required".into()));
  }
  if body.password.len() < 8 {
    return Err(ApiError::Validation("Password must be at least 8 characters".into()));
  }
  Ok(())
}

#[instrument(level = "info", skip(state, body), fields(username = %body.username))]
pub async fn register(
  State(state): State<AppState>,
  Json(body): Json<RegisterIn>,
) -> Result<Json<Value>, ApiError> {
  validate_registration(&body)?;

  let mut db = state.db.write().await;
  if db.user_by_username(&body.username).is_some() {
    return Err(ApiError::Conflict("Username already taken".into()));
  }
  if db.user_by_email(&body.email).is_some() {
    return Err(ApiError::Conflict("Email already registered".into()));
  }

  let user = crate::domain::user::User::new(
    body.username.trim().to_string(),
    body.email.trim().to_lowercase(),
    hash_password(&body.password),
    body.profile.unwrap_or_default(),
    Utc::now(),
  );
  let token = issue_token(&state.token_secret, &user.id, Utc::now());
  info!(target: "buddy_backend", user_id = %user.id, "Account registered");
  let out = json!({ "user": &user, "token": token });
  let user_id = user.id.clone();
  db.users.insert(user_id.clone(), user);
  // Fresh accounts qualify for nothing yet, but the sweep stays in the
  // registration path so catalog changes apply from day one.
  crate::badges::check_and_award_badges(&mut db, &user_id, Utc::now());
  Ok(ok_msg("Account created", out))
}

#[instrument(level = "info", skip(state, body), fields(identifier = %body.identifier))]
pub async fn login(
  State(state): State<AppState>,
  Json(body): Json<LoginIn>,
) -> Result<Json<Value>, ApiError> {
  let mut db = state.db.write().await;
  let user_id = db
    .user_by_username(&body.identifier)
    .or_else(|| db.user_by_email(&body.identifier))
    .map(|u| u.id.clone())
    .ok_or_else(|| ApiError::Auth("Invalid credentials".into()))?;

  let user = db.users.get_mut(&user_id).ok_or_else(|| ApiError::Auth("Invalid credentials".into()))?;
  if !user.is_active || !verify_password(&body.password, &user.password_hash) {
    return Err(ApiError::Auth("Invalid credentials".into()));
  }
  user.last_login = Some(Utc::now());

  let token = issue_token(&state.token_secret, &user.id, Utc::now());
  info!(target: "buddy_backend", %user_id, "Login");
  Ok(ok(json!({ "user": user, "token": token })))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn get_profile(
  State(state): State<AppState>,
  user: AuthUser,
) -> Result<Json<Value>, ApiError> {
  let db = state.db.read().await;
  let doc = db.users.get(&user.id).ok_or(ApiError::NotFound("User"))?;
  Ok(ok(doc))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_profile(
  State(state): State<AppState>,
  user: AuthUser,
  Json(body): Json<ProfileUpdateIn>,
) -> Result<Json<Value>, ApiError> {
  let mut db = state.db.write().await;
  let doc = db.users.get_mut(&user.id).ok_or(ApiError::NotFound("User"))?;

  if body.first_name.is_some() {
    doc.profile.first_name = body.first_name;
  }
  if body.last_name.is_some() {
    doc.profile.last_name = body.last_name;
  }
  if body.bio.is_some() {
    doc.profile.bio = body.bio;
  }
  if body.location.is_some() {
    doc.profile.location = body.location;
  }
  if let Some(tz) = body.timezone {
    doc.profile.timezone = tz;
  }
  Ok(ok_msg("Profile updated", &*doc))
}

#[instrument(level = "info", skip_all, fields(user_id = %user.id))]
pub async fn change_password(
  State(state): State<AppState>,
  user: AuthUser,
  Json(body): Json<ChangePasswordIn>,
) -> Result<Json<Value>, ApiError> {
  if body.new_password.len() < 8 {
    return Err(ApiError::Validation("Password must be at least 8 characters".into()));
  }
  let mut db = state.db.write().await;
  let doc = db.users.get_mut(&user.id).ok_or(ApiError::NotFound("User"))?;
  if !verify_password(&body.current_password, &doc.password_hash) {
    return Err(ApiError::Auth("Current password is incorrect".into()));
  }
  doc.password_hash = hash_password(&body.new_password);
  info!(target: "buddy_backend", user_id = %user.id, "Password changed");
  Ok(ok_msg("Password changed", json!({})))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_settings(
  State(state): State<AppState>,
  user: AuthUser,
  Json(body): Json<SettingsIn>,
) -> Result<Json<Value>, ApiError> {
  let mut db = state.db.write().await;
  let doc = db.users.get_mut(&user.id).ok_or(ApiError::NotFound("User"))?;

  if let Some(v) = body.show_in_leaderboard {
    doc.settings.show_in_leaderboard = v;
  }
  if let Some(v) = body.daily_goal_minutes {
    if v == 0 || v > 24 * 60 {
      return Err(ApiError::Validation("Daily goal must be between 1 and 1440 minutes".into()));
    }
    doc.settings.daily_goal_minutes = v;
  }
  if let Some(v) = body.email_notifications {
    doc.settings.email_notifications = v;
  }
  if let Some(v) = body.achievement_alerts {
    doc.settings.achievement_alerts = v;
  }
  Ok(ok_msg("Settings updated", &doc.settings))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn delete_account(
  State(state): State<AppState>,
  user: AuthUser,
) -> Result<Json<Value>, ApiError> {
  let mut db = state.db.write().await;
  let doc = db.users.get_mut(&user.id).ok_or(ApiError::NotFound("User"))?;
  doc.deactivate();
  info!(target: "buddy_backend", user_id = %user.id, "Account deactivated");
  Ok(ok_msg("Account deleted", json!({})))
}
