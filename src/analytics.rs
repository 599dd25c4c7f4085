//! Read-side analytics: pure computations over the attempt ledger and user
//! documents. Nothing here mutates state and everything is recomputed per
//! request; empty histories report zeros instead of erroring.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::domain::attempt::{Attempt, AttemptStatus};
use crate::domain::challenge::{Category, Difficulty};
use crate::error::ApiError;
use crate::store::Db;

/// Below this many completed attempts a trend is not called either way.
const TREND_MIN_SAMPLES: usize = 4;
/// Mean difference (percentage points) treated as noise.
const TREND_STABLE_BAND: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
  Improving,
  Declining,
  Stable,
  InsufficientData,
}

/// Compare first-half vs second-half means of a time-ordered score series.
pub fn classify_trend(scores: &[f64]) -> Trend {
  if scores.len() < TREND_MIN_SAMPLES {
    return Trend::InsufficientData;
  }
  let mid = scores.len() / 2;
  let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
  let delta = mean(&scores[mid..]) - mean(&scores[..mid]);
  if delta > TREND_STABLE_BAND {
    Trend::Improving
  } else if delta < -TREND_STABLE_BAND {
    Trend::Declining
  } else {
    Trend::Stable
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreakStatus {
  Active,
  AtRisk,
  Broken,
}

fn streak_status(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> StreakStatus {
  match last_activity {
    None => StreakStatus::Broken,
    Some(last) => match (now - last).num_days() {
      0 => StreakStatus::Active,
      1 => StreakStatus::AtRisk,
      _ => StreakStatus::Broken,
    },
  }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
  pub challenge_id: String,
  pub challenge_title: String,
  pub status: AttemptStatus,
  pub percentage: u8,
  pub passed: bool,
  pub xp_earned: u64,
  pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
  pub level: u32,
  pub xp: u64,
  pub total_xp: u64,
  pub xp_to_next_level: i64,
  pub streak_current: u32,
  pub streak_longest: u32,
  pub streak_status: StreakStatus,
  pub badges_earned: usize,
  pub challenges_completed: u64,
  pub average_score: f64,
  pub total_time_spent: u64,
  pub active_enrollments: usize,
  pub recent_attempts: Vec<AttemptSummary>,
}

/// Per-user home-screen rollup.
#[instrument(level = "debug", skip(db, now), fields(%user_id))]
pub fn dashboard(db: &Db, user_id: &str, now: DateTime<Utc>) -> Result<DashboardReport, ApiError> {
  let user = db.users.get(user_id).ok_or(ApiError::NotFound("User"))?;

  let mut recent: Vec<&Attempt> = db
    .user_attempts(user_id)
    .into_iter()
    .filter(|a| a.status != AttemptStatus::InProgress)
    .collect();
  recent.sort_by_key(|a| std::cmp::Reverse(a.completed_at));
  let recent_attempts = recent
    .into_iter()
    .take(5)
    .map(|a| AttemptSummary {
      challenge_id: a.challenge_id.clone(),
      challenge_title: db
        .challenges
        .get(&a.challenge_id)
        .map(|c| c.title.clone())
        .unwrap_or_default(),
      status: a.status,
      percentage: a.percentage,
      passed: a.passed,
      xp_earned: a.xp_earned,
      completed_at: a.completed_at,
    })
    .collect();

  Ok(DashboardReport {
    level: user.gamification.level,
    xp: user.gamification.xp,
    total_xp: user.gamification.total_xp,
    xp_to_next_level: user.gamification.xp_to_next_level(),
    streak_current: user.gamification.streak.current,
    streak_longest: user.gamification.streak.longest,
    streak_status: streak_status(user.gamification.streak.last_activity, now),
    badges_earned: user.gamification.badges.len(),
    challenges_completed: user.statistics.challenges_completed,
    average_score: user.statistics.average_score,
    total_time_spent: user.statistics.total_time_spent,
    active_enrollments: db.user_enrollments(user_id).iter().filter(|e| !e.completed).count(),
    recent_attempts,
  })
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBreakdown<K: Serialize> {
  pub key: K,
  pub attempts: u64,
  pub completed: u64,
  pub average_score: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
  pub date: NaiveDate,
  pub attempts: u64,
  pub xp_earned: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekBucket {
  /// Monday of the week.
  pub week_start: NaiveDate,
  pub attempts: u64,
  pub xp_earned: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningReport {
  pub window_days: i64,
  pub total_attempts: u64,
  pub completed_attempts: u64,
  pub passed_attempts: u64,
  pub average_score: f64,
  pub perfect_scores: u64,
  pub faster_than_estimated: u64,
  pub trend: Trend,
  pub by_category: Vec<GroupBreakdown<Category>>,
  pub by_difficulty: Vec<GroupBreakdown<Difficulty>>,
  pub daily_activity: Vec<DayBucket>,
  pub weekly_activity: Vec<WeekBucket>,
  /// Categories with completions averaging under 70%, weakest first.
  pub improvement_areas: Vec<Category>,
}

/// Windowed per-user learning report over the attempt ledger.
#[instrument(level = "debug", skip(db, now), fields(%user_id, window_days))]
pub fn learning(
  db: &Db,
  user_id: &str,
  window_days: i64,
  now: DateTime<Utc>,
) -> Result<LearningReport, ApiError> {
  if !db.users.contains_key(user_id) {
    return Err(ApiError::NotFound("User"));
  }
  let since = now - Duration::days(window_days);
  let attempts: Vec<&Attempt> = db
    .user_attempts(user_id)
    .into_iter()
    .filter(|a| a.started_at >= since)
    .collect();

  let completed: Vec<&&Attempt> =
    attempts.iter().filter(|a| a.status == AttemptStatus::Completed).collect();
  let average_score = if completed.is_empty() {
    0.0
  } else {
    completed.iter().map(|a| a.percentage as f64).sum::<f64>() / completed.len() as f64
  };
  let faster_than_estimated = completed
    .iter()
    .filter(|a| (a.time_spent as f64) < a.estimated_time as f64 * 60.0 * 0.8)
    .count() as u64;

  // Trend over completion-ordered scores.
  let mut ordered: Vec<&&Attempt> = completed.clone();
  ordered.sort_by_key(|a| a.completed_at);
  let scores: Vec<f64> = ordered.iter().map(|a| a.percentage as f64).collect();

  let mut by_category: HashMap<Category, (u64, u64, f64)> = HashMap::new();
  let mut by_difficulty: HashMap<Difficulty, (u64, u64, f64)> = HashMap::new();
  for a in &attempts {
    let Some(ch) = db.challenges.get(&a.challenge_id) else { continue };
    for (count, done, score_sum) in [
      by_category.entry(ch.category).or_default(),
      by_difficulty.entry(ch.difficulty).or_default(),
    ] {
      *count += 1;
      if a.status == AttemptStatus::Completed {
        *done += 1;
        *score_sum += a.percentage as f64;
      }
    }
  }
  fn finish<K: Serialize>(m: HashMap<K, (u64, u64, f64)>) -> Vec<GroupBreakdown<K>> {
    let mut v: Vec<GroupBreakdown<K>> = m
      .into_iter()
      .map(|(key, (attempts, completed, sum))| GroupBreakdown {
        key,
        attempts,
        completed,
        average_score: if completed == 0 { 0.0 } else { sum / completed as f64 },
      })
      .collect();
    v.sort_by(|a, b| b.attempts.cmp(&a.attempts));
    v
  }

  let mut daily: HashMap<NaiveDate, (u64, u64)> = HashMap::new();
  for a in &attempts {
    let day = a.completed_at.unwrap_or(a.started_at).date_naive();
    let e = daily.entry(day).or_default();
    e.0 += 1;
    e.1 += a.xp_earned;
  }
  let mut daily_activity: Vec<DayBucket> = daily
    .into_iter()
    .map(|(date, (attempts, xp_earned))| DayBucket { date, attempts, xp_earned })
    .collect();
  daily_activity.sort_by_key(|b| b.date);

  let mut weekly: HashMap<NaiveDate, (u64, u64)> = HashMap::new();
  for b in &daily_activity {
    let week_start = b.date - Duration::days(b.date.weekday().num_days_from_monday() as i64);
    let e = weekly.entry(week_start).or_default();
    e.0 += b.attempts;
    e.1 += b.xp_earned;
  }
  let mut weekly_activity: Vec<WeekBucket> = weekly
    .into_iter()
    .map(|(week_start, (attempts, xp_earned))| WeekBucket { week_start, attempts, xp_earned })
    .collect();
  weekly_activity.sort_by_key(|b| b.week_start);

  let by_category = finish(by_category);
  let mut weak: Vec<&GroupBreakdown<Category>> =
    by_category.iter().filter(|g| g.completed > 0 && g.average_score < 70.0).collect();
  weak.sort_by(|a, b| a.average_score.total_cmp(&b.average_score));
  let improvement_areas: Vec<Category> = weak.into_iter().map(|g| g.key).take(3).collect();

  Ok(LearningReport {
    window_days,
    total_attempts: attempts.len() as u64,
    completed_attempts: completed.len() as u64,
    passed_attempts: completed.iter().filter(|a| a.passed).count() as u64,
    average_score,
    perfect_scores: completed.iter().filter(|a| a.percentage == 100).count() as u64,
    faster_than_estimated,
    trend: classify_trend(&scores),
    by_category,
    by_difficulty: finish(by_difficulty),
    daily_activity,
    weekly_activity,
    improvement_areas,
  })
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularChallenge {
  pub challenge_id: String,
  pub title: String,
  pub total_attempts: u64,
  pub average_score: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemReport {
  pub total_users: usize,
  pub active_users_last_week: usize,
  pub total_challenges: usize,
  pub total_paths: usize,
  pub path_enrollments: usize,
  pub total_attempts: usize,
  pub completed_attempts: usize,
  pub average_score: f64,
  pub badges_awarded: u64,
  pub popular_challenges: Vec<PopularChallenge>,
}

/// Admin-only whole-system rollup.
#[instrument(level = "debug", skip(db, now))]
pub fn system(db: &Db, now: DateTime<Utc>) -> SystemReport {
  let week_ago = now - Duration::days(7);
  let completed: Vec<&Attempt> =
    db.attempts.values().filter(|a| a.status == AttemptStatus::Completed).collect();
  let average_score = if completed.is_empty() {
    0.0
  } else {
    completed.iter().map(|a| a.percentage as f64).sum::<f64>() / completed.len() as f64
  };

  let mut popular: Vec<PopularChallenge> = db
    .challenges
    .values()
    .filter(|c| c.statistics.total_attempts > 0)
    .map(|c| PopularChallenge {
      challenge_id: c.id.clone(),
      title: c.title.clone(),
      total_attempts: c.statistics.total_attempts,
      average_score: c.statistics.average_score,
    })
    .collect();
  popular.sort_by_key(|p| std::cmp::Reverse(p.total_attempts));
  popular.truncate(5);

  SystemReport {
    total_users: db.users.values().filter(|u| u.is_active).count(),
    active_users_last_week: db
      .users
      .values()
      .filter(|u| u.gamification.streak.last_activity.map(|t| t >= week_ago).unwrap_or(false))
      .count(),
    total_challenges: db.challenges.len(),
    total_paths: db.paths.len(),
    path_enrollments: db.enrollments.len(),
    total_attempts: db.attempts.len(),
    completed_attempts: completed.len(),
    average_score,
    badges_awarded: db.badges.values().map(|b| b.statistics.times_awarded).sum(),
    popular_challenges: popular,
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderboardMetric {
  #[default]
  Xp,
  Level,
  Badges,
  Challenges,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
  pub rank: usize,
  pub username: String,
  pub level: u32,
  pub total_xp: u64,
  pub badges: usize,
  pub challenges_completed: u64,
}

fn ranked_users(db: &Db, metric: LeaderboardMetric) -> Vec<&crate::domain::user::User> {
  let mut users: Vec<_> =
    db.users.values().filter(|u| u.is_active && u.settings.show_in_leaderboard).collect();
  users.sort_by(|a, b| match metric {
    LeaderboardMetric::Xp => b.gamification.total_xp.cmp(&a.gamification.total_xp),
    LeaderboardMetric::Level => b
      .gamification
      .level
      .cmp(&a.gamification.level)
      .then(b.gamification.total_xp.cmp(&a.gamification.total_xp)),
    LeaderboardMetric::Badges => b.gamification.badges.len().cmp(&a.gamification.badges.len()),
    LeaderboardMetric::Challenges => {
      b.statistics.challenges_completed.cmp(&a.statistics.challenges_completed)
    }
  });
  users
}

/// Caller's 1-based position in the full ordering; None when opted out,
/// deactivated, or unknown.
pub fn user_rank(db: &Db, metric: LeaderboardMetric, user_id: &str) -> Option<usize> {
  ranked_users(db, metric).iter().position(|u| u.id == user_id).map(|i| i + 1)
}

/// Opt-in leaderboard over active accounts.
#[instrument(level = "debug", skip(db))]
pub fn leaderboard(db: &Db, metric: LeaderboardMetric, limit: usize) -> Vec<LeaderboardEntry> {
  ranked_users(db, metric)
    .into_iter()
    .take(limit)
    .enumerate()
    .map(|(i, u)| LeaderboardEntry {
      rank: i + 1,
      username: u.username.clone(),
      level: u.gamification.level,
      total_xp: u.gamification.total_xp,
      badges: u.gamification.badges.len(),
      challenges_completed: u.statistics.challenges_completed,
    })
    .collect()
}
