//! Learning-path endpoints: catalog, enrollment, and step completion.
//!
//! Step completion mirrors challenge submission: XP from the step and any
//! milestones, streak update, and the badge sweep all happen under one guard.

use axum::{
  extract::{Path, State},
  Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::auth::{AuthUser, OptionalUser};
use crate::badges::check_and_award_badges;
use crate::domain::path::{PathProgress, StepResult};
use crate::error::ApiError;
use crate::protocol::*;
use crate::store::AppState;

#[instrument(level = "info", skip(state))]
pub async fn list(State(state): State<AppState>, _user: OptionalUser) -> Json<Value> {
  let db = state.db.read().await;
  let mut items: Vec<_> = db.paths.values().filter(|p| p.is_available()).collect();
  items.sort_by(|a, b| a.title.cmp(&b.title));
  ok(items)
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn get_one(
  State(state): State<AppState>,
  Path(id): Path<String>,
  _user: OptionalUser,
) -> Result<Json<Value>, ApiError> {
  let db = state.db.read().await;
  let path = db.paths.get(&id).filter(|p| p.is_available()).ok_or(ApiError::NotFound("Learning path"))?;
  Ok(ok(path))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id, path_id = %id))]
pub async fn enroll(
  State(state): State<AppState>,
  Path(id): Path<String>,
  user: AuthUser,
) -> Result<Json<Value>, ApiError> {
  let mut db = state.db.write().await;
  if db.paths.get(&id).filter(|p| p.is_available()).is_none() {
    return Err(ApiError::NotFound("Learning path"));
  }
  if db.enrollment(&user.id, &id).is_some() {
    return Err(ApiError::Conflict("Already enrolled in this learning path".into()));
  }

  let progress = PathProgress::enroll(&user.id, &id, Utc::now());
  if let Some(p) = db.paths.get_mut(&id) {
    p.statistics.enrollments += 1;
  }
  info!(target: "path", user_id = %user.id, path_id = %id, "Enrolled");
  let out = ok_msg("Enrolled", &progress);
  db.enrollments.insert(progress.id.clone(), progress);
  Ok(out)
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id, path_id = %id))]
pub async fn progress(
  State(state): State<AppState>,
  Path(id): Path<String>,
  user: AuthUser,
) -> Result<Json<Value>, ApiError> {
  let db = state.db.read().await;
  let enrollment = db.enrollment(&user.id, &id).ok_or(ApiError::NotFound("Enrollment"))?;
  Ok(ok(enrollment))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id, path_id = %id, step = n))]
pub async fn complete_step(
  State(state): State<AppState>,
  Path((id, n)): Path<(String, u32)>,
  user: AuthUser,
  Json(body): Json<StepResult>,
) -> Result<Json<Value>, ApiError> {
  let now = Utc::now();
  let mut db = state.db.write().await;

  let path = db.paths.get(&id).filter(|p| p.is_available()).ok_or(ApiError::NotFound("Learning path"))?;
  let step = path.step(n).ok_or(ApiError::NotFound("Step"))?.clone();
  let total_steps = path.total_steps;

  let enrollment = db.enrollment(&user.id, &id).ok_or(ApiError::NotFound("Enrollment"))?;

  // Earlier steps named as prerequisites must already be done.
  let done: Vec<u32> = enrollment.completed_steps.iter().map(|s| s.step_number).collect();
  let blocked: Vec<u32> =
    step.prerequisites.iter().copied().filter(|p| !done.contains(p)).collect();
  if !blocked.is_empty() {
    return Err(ApiError::Validation(format!(
      "Steps {blocked:?} must be completed first"
    )));
  }

  let enrollment = db
    .enrollment_mut(&user.id, &id)
    .ok_or_else(|| ApiError::Internal("enrollment vanished under the write guard".into()))?;
  let outcome = enrollment.complete_step(step.xp_reward, total_steps, n, body, now);
  let enrollment = enrollment.clone();

  if outcome.path_completed {
    if let Some(p) = db.paths.get_mut(&id) {
      p.statistics.completions += 1;
    }
    info!(target: "path", user_id = %user.id, path_id = %id, "Path completed");
  }

  let user_doc = db.users.get_mut(&user.id).ok_or(ApiError::NotFound("User"))?;
  let level = user_doc.gamification.award_xp(outcome.xp_awarded);
  user_doc.gamification.update_streak(now);

  let new_badges = check_and_award_badges(&mut db, &user.id, now);

  Ok(ok_msg(
    "Step completed",
    json!({
      "progress": enrollment,
      "xpAwarded": outcome.xp_awarded,
      "newMilestones": outcome.new_milestones,
      "pathCompleted": outcome.path_completed,
      "level": level,
      "newBadges": new_badges,
    }),
  ))
}
