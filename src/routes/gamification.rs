//! Badge catalog, leaderboard, and the on-demand badge sweep.

use axum::{
  extract::{Query, State},
  Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::instrument;

use crate::analytics;
use crate::auth::{AuthUser, OptionalUser};
use crate::badges::check_and_award_badges;
use crate::protocol::*;
use crate::store::AppState;

/// Public badge catalog. With auth, each entry also says whether the caller
/// holds it.
#[instrument(level = "info", skip(state, user))]
pub async fn badges(State(state): State<AppState>, user: OptionalUser) -> Json<Value> {
  let db = state.db.read().await;
  let earned: Vec<String> = user
    .0
    .as_ref()
    .and_then(|u| db.users.get(&u.id))
    .map(|u| u.gamification.badges.iter().map(|b| b.badge_id.clone()).collect())
    .unwrap_or_default();

  let mut items: Vec<Value> = db
    .badges
    .values()
    .filter(|b| b.is_active)
    .map(|b| {
      let mut v = serde_json::to_value(b).unwrap_or_default();
      if let Some(obj) = v.as_object_mut() {
        obj.insert("earned".into(), json!(earned.contains(&b.id)));
      }
      v
    })
    .collect();
  items.sort_by_key(|v| v.get("name").and_then(Value::as_str).map(str::to_string));
  ok(items)
}

#[instrument(level = "info", skip(state, q, user))]
pub async fn leaderboard(
  State(state): State<AppState>,
  Query(q): Query<LeaderboardQuery>,
  user: OptionalUser,
) -> Json<Value> {
  let db = state.db.read().await;
  let limit = q.limit.unwrap_or(10).min(100);
  let entries = analytics::leaderboard(&db, q.metric, limit);
  let current_rank = user.0.as_ref().and_then(|u| analytics::user_rank(&db, q.metric, &u.id));
  ok(json!({ "entries": entries, "currentUserRank": current_rank }))
}

/// Re-run the badge sweep for the caller. Safe to call repeatedly; badges
/// already held are skipped.
#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn check_badges(State(state): State<AppState>, user: AuthUser) -> Json<Value> {
  let mut db = state.db.write().await;
  let awarded = check_and_award_badges(&mut db, &user.id, Utc::now());
  ok(json!({ "newBadges": awarded }))
}
