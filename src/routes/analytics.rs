//! Analytics endpoints: per-user rollups and the admin system report.

use axum::{
  extract::{Query, State},
  Json,
};
use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use crate::analytics as reports;
use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiError;
use crate::protocol::*;
use crate::store::AppState;

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn dashboard(
  State(state): State<AppState>,
  user: AuthUser,
) -> Result<Json<Value>, ApiError> {
  let db = state.db.read().await;
  Ok(ok(reports::dashboard(&db, &user.id, Utc::now())?))
}

#[instrument(level = "info", skip(state, user, q), fields(user_id = %user.id))]
pub async fn learning(
  State(state): State<AppState>,
  user: AuthUser,
  Query(q): Query<LearningQuery>,
) -> Result<Json<Value>, ApiError> {
  let days = q.days.unwrap_or(30).clamp(1, 365);
  let db = state.db.read().await;
  Ok(ok(reports::learning(&db, &user.id, days, Utc::now())?))
}

#[instrument(level = "info", skip(state, admin), fields(user_id = %admin.0.id))]
pub async fn system(State(state): State<AppState>, admin: AdminUser) -> Json<Value> {
  let db = state.db.read().await;
  ok(reports::system(&db, Utc::now()))
}
