//! The badge sweep: after any progress event, evaluate every active badge
//! against the user and award the ones newly qualified for.
//!
//! Awards are idempotent (a held badge is never re-awarded) and isolated: one
//! badge failing to apply is logged and skipped without aborting the sweep.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::domain::badge::Rarity;
use crate::domain::user::{Achievement, EarnedBadge};
use crate::store::Db;

/// One newly awarded badge, surfaced in responses alongside the result that
/// triggered it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardedBadge {
  pub badge_id: String,
  pub name: String,
  pub description: String,
  pub icon: String,
  pub rarity: Rarity,
  pub xp_bonus: u64,
}

/// Evaluate all active badges for `user_id` and award those whose criteria
/// now hold. Caller must already hold the write guard; the whole sweep is
/// part of the surrounding update.
#[instrument(level = "debug", skip(db), fields(%user_id))]
pub fn check_and_award_badges(db: &mut Db, user_id: &str, now: DateTime<Utc>) -> Vec<AwardedBadge> {
  if !db.users.contains_key(user_id) {
    error!(target: "badge", %user_id, "Badge sweep for unknown user");
    return Vec::new();
  }

  // Awards cascade: an xp_bonus can push the user over a total-XP or
  // average-score threshold, so criteria are re-evaluated after every award
  // until nothing new qualifies. Failed badges are set aside so the sweep
  // cannot retry them forever.
  let mut awarded = Vec::new();
  let mut failed: HashSet<String> = HashSet::new();
  loop {
    let Some(user) = db.users.get(user_id) else { break };
    let next = db
      .badges
      .values()
      .filter(|b| b.is_active && !user.gamification.has_badge(&b.id) && !failed.contains(&b.id))
      .find(|b| b.qualifies(user, db))
      .map(|b| b.id.clone());
    let Some(badge_id) = next else { break };

    match apply_award(db, user_id, &badge_id, now) {
      Ok(a) => {
        info!(target: "badge", %user_id, badge = %a.badge_id, name = %a.name, xp_bonus = a.xp_bonus, "Badge awarded");
        awarded.push(a);
      }
      Err(e) => {
        error!(target: "badge", %user_id, %badge_id, error = %e, "Badge award failed; continuing sweep");
        failed.insert(badge_id);
      }
    }
  }
  awarded
}

fn apply_award(
  db: &mut Db,
  user_id: &str,
  badge_id: &str,
  now: DateTime<Utc>,
) -> Result<AwardedBadge, String> {
  let badge = db.badges.get(badge_id).ok_or("badge disappeared mid-sweep")?.clone();
  let user = db.users.get_mut(user_id).ok_or("user disappeared mid-sweep")?;

  // Re-check under the mutable borrow; awards stay idempotent even if the
  // same badge shows up twice in one sweep.
  if user.gamification.has_badge(badge_id) {
    return Err("badge already held".into());
  }

  user.gamification.badges.push(EarnedBadge { badge_id: badge.id.clone(), earned_at: now });
  user.gamification.achievements.push(Achievement {
    name: badge.name.clone(),
    description: badge.description.clone(),
    earned_at: now,
    xp_reward: badge.xp_bonus,
  });
  user.gamification.award_xp(badge.xp_bonus);

  let unique_earners = db
    .users
    .values()
    .filter(|u| u.gamification.has_badge(badge_id))
    .count() as u64;
  if let Some(b) = db.badges.get_mut(badge_id) {
    b.statistics.times_awarded += 1;
    b.statistics.unique_earners = unique_earners;
    b.statistics.first_earned_at.get_or_insert(now);
    b.statistics.last_earned_at = Some(now);
  }

  Ok(AwardedBadge {
    badge_id: badge.id,
    name: badge.name,
    description: badge.description,
    icon: badge.icon,
    rarity: badge.rarity,
    xp_bonus: badge.xp_bonus,
  })
}
