//! User documents: identity, profile, settings, and the gamification state the
//! progression engine mutates (XP, level, streak, badges, statistics).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// XP threshold per level. Level is always derived from total XP.
pub const XP_PER_LEVEL: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Learner,
  Admin,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub bio: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default = "default_timezone")]
  pub timezone: String,
}

fn default_timezone() -> String {
  "UTC".into()
}

/// Account settings a user can edit via PUT /auth/settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
  pub show_in_leaderboard: bool,
  pub daily_goal_minutes: u32,
  pub email_notifications: bool,
  pub achievement_alerts: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      show_in_leaderboard: true,
      daily_goal_minutes: 30,
      email_notifications: true,
      achievement_alerts: true,
    }
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
  pub current: u32,
  pub longest: u32,
  pub last_activity: Option<DateTime<Utc>>,
}

/// One badge held by a user; unique per badge id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBadge {
  pub badge_id: String,
  pub earned_at: DateTime<Utc>,
}

/// Append-only achievement log entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
  pub name: String,
  pub description: String,
  pub earned_at: DateTime<Utc>,
  pub xp_reward: u64,
}

/// Result of an XP award, reported to callers so they can surface level-ups.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUp {
  pub leveled_up: bool,
  pub new_level: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gamification {
  pub level: u32,
  pub xp: u64,
  pub total_xp: u64,
  pub streak: Streak,
  pub badges: Vec<EarnedBadge>,
  pub achievements: Vec<Achievement>,
}

impl Default for Gamification {
  fn default() -> Self {
    Self {
      level: 1,
      xp: 0,
      total_xp: 0,
      streak: Streak::default(),
      badges: Vec::new(),
      achievements: Vec::new(),
    }
  }
}

impl Gamification {
  /// Award XP and recompute the level from total XP. Level is a pure function
  /// of `total_xp` (1000 per level) and never decreases. Amount 0 is legal.
  pub fn award_xp(&mut self, amount: u64) -> LevelUp {
    self.xp += amount;
    self.total_xp += amount;

    let new_level = (self.total_xp / XP_PER_LEVEL) as u32 + 1;
    if new_level > self.level {
      self.level = new_level;
      return LevelUp { leveled_up: true, new_level };
    }
    LevelUp { leveled_up: false, new_level: self.level }
  }

  /// XP gap to the current level threshold (observed formula, kept verbatim:
  /// it multiplies the CURRENT level, not level + 1).
  pub fn xp_to_next_level(&self) -> i64 {
    self.level as i64 * XP_PER_LEVEL as i64 - self.xp as i64
  }

  /// Update the daily streak for an activity at `now`. Same-day calls are
  /// idempotent on the counter; exactly one day later extends the streak;
  /// a longer gap resets it. The last-activity timestamp always advances.
  pub fn update_streak(&mut self, now: DateTime<Utc>) {
    let Some(last) = self.streak.last_activity else {
      self.streak.current = 1;
      self.streak.last_activity = Some(now);
      return;
    };

    let days_diff = (now - last).num_days();
    if days_diff == 1 {
      self.streak.current += 1;
      if self.streak.current > self.streak.longest {
        self.streak.longest = self.streak.current;
      }
    } else if days_diff > 1 {
      self.streak.current = 1;
    }
    // days_diff == 0: same day, counter unchanged.

    self.streak.last_activity = Some(now);
  }

  pub fn has_badge(&self, badge_id: &str) -> bool {
    self.badges.iter().any(|b| b.badge_id == badge_id)
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
  /// Minutes spent across all completed challenges.
  pub total_time_spent: u64,
  pub challenges_completed: u64,
  pub challenges_attempted: u64,
  /// 0..=100, maintained incrementally.
  pub average_score: f64,
}

impl Statistics {
  /// Fold one completed attempt into the counters and the running average.
  pub fn record_completion(&mut self, percentage: u8, minutes_spent: u64) {
    self.challenges_completed += 1;
    self.challenges_attempted += 1;
    self.total_time_spent += minutes_spent;
    self.average_score = crate::util::running_average(
      self.average_score,
      self.challenges_completed,
      percentage as f64,
    );
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub username: String,
  pub email: String,
  /// Salted digest, never serialized outward.
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub role: Role,
  pub profile: Profile,
  pub settings: Settings,
  pub gamification: Gamification,
  pub statistics: Statistics,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
  pub last_login: Option<DateTime<Utc>>,
}

impl User {
  pub fn new(
    username: String,
    email: String,
    password_hash: String,
    profile: Profile,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      username,
      email,
      password_hash,
      role: Role::Learner,
      profile,
      settings: Settings::default(),
      gamification: Gamification::default(),
      statistics: Statistics::default(),
      is_active: true,
      created_at: now,
      last_login: None,
    }
  }

  pub fn is_admin(&self) -> bool {
    self.role == Role::Admin
  }

  /// Soft deletion: the account is deactivated and credentials tombstoned so
  /// the document survives for attempt-ledger references.
  pub fn deactivate(&mut self) {
    self.is_active = false;
    self.password_hash.clear();
    self.email = format!("deleted-{}@invalid", self.id);
  }
}
