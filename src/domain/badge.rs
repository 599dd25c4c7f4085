//! Badge definitions and their award criteria.
//!
//! A badge carries a list of criteria; every criterion must hold for the badge
//! to be awarded (unset criteria simply do not appear in the list). Criteria
//! that need attempt history go through the [`AttemptLedger`] seam so the
//! predicates stay testable without a full store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::challenge::Category;
use crate::domain::user::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
  Common,
  Uncommon,
  Rare,
  Epic,
  Legendary,
}

/// Read-only view over a user's attempt history, used by criteria that cannot
/// be answered from the user document alone.
pub trait AttemptLedger {
  /// Completed attempts for the user, optionally restricted to a category.
  fn completed_count(&self, user_id: &str, category: Option<Category>) -> u64;
  /// Completed attempts with a 100% score.
  fn perfect_count(&self, user_id: &str) -> u64;
}

/// One award predicate. A badge holds several; all must be satisfied.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Criterion {
  /// Lifetime XP at or above the threshold.
  TotalXp { amount: u64 },
  /// Completed challenge count, optionally within one category.
  ChallengesCompleted {
    count: u64,
    #[serde(default)]
    category: Option<Category>,
  },
  /// Number of 100% attempts.
  PerfectScores { count: u64 },
  /// Current streak length in days.
  StreakDays { days: u32 },
  /// Rolling average score at or above the threshold.
  AverageScore { minimum: f64 },
  /// Total minutes spent on completed challenges.
  TotalTimeSpent { minutes: u64 },
}

impl Criterion {
  pub fn satisfied(&self, user: &User, ledger: &dyn AttemptLedger) -> bool {
    match self {
      Criterion::TotalXp { amount } => user.gamification.total_xp >= *amount,
      Criterion::ChallengesCompleted { count, category } => match category {
        Some(cat) => ledger.completed_count(&user.id, Some(*cat)) >= *count,
        None => user.statistics.challenges_completed >= *count,
      },
      Criterion::PerfectScores { count } => ledger.perfect_count(&user.id) >= *count,
      Criterion::StreakDays { days } => user.gamification.streak.current >= *days,
      Criterion::AverageScore { minimum } => {
        user.statistics.challenges_completed > 0 && user.statistics.average_score >= *minimum
      }
      Criterion::TotalTimeSpent { minutes } => user.statistics.total_time_spent >= *minutes,
    }
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeStats {
  pub times_awarded: u64,
  pub unique_earners: u64,
  #[serde(default)]
  pub first_earned_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub last_earned_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
  pub id: String,
  pub name: String,
  pub description: String,
  pub icon: String,
  pub rarity: Rarity,
  pub criteria: Vec<Criterion>,
  /// Awarded alongside the badge itself.
  pub xp_bonus: u64,
  pub is_active: bool,
  pub statistics: BadgeStats,
  pub created_at: DateTime<Utc>,
}

impl Badge {
  /// All criteria must hold. A badge with no criteria is never auto-awarded.
  pub fn qualifies(&self, user: &User, ledger: &dyn AttemptLedger) -> bool {
    !self.criteria.is_empty() && self.criteria.iter().all(|c| c.satisfied(user, ledger))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::user::Profile;

  struct FakeLedger {
    completed: u64,
    completed_programming: u64,
    perfect: u64,
  }

  impl AttemptLedger for FakeLedger {
    fn completed_count(&self, _user_id: &str, category: Option<Category>) -> u64 {
      match category {
        Some(Category::Programming) => self.completed_programming,
        Some(_) => 0,
        None => self.completed,
      }
    }
    fn perfect_count(&self, _user_id: &str) -> u64 {
      self.perfect
    }
  }

  fn user() -> User {
    User::new("ana".into(), "ana@example.com".into(), "digest".into(), Profile::default(), Utc::now())
  }

  fn ledger() -> FakeLedger {
    FakeLedger { completed: 0, completed_programming: 0, perfect: 0 }
  }

  fn badge(criteria: Vec<Criterion>) -> Badge {
    Badge {
      id: "b1".into(),
      name: "Test".into(),
      description: "d".into(),
      icon: "star".into(),
      rarity: Rarity::Common,
      criteria,
      xp_bonus: 50,
      is_active: true,
      statistics: BadgeStats::default(),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn all_criteria_must_hold() {
    let mut u = user();
    u.gamification.award_xp(500);
    u.statistics.challenges_completed = 3;
    let b = badge(vec![
      Criterion::TotalXp { amount: 400 },
      Criterion::ChallengesCompleted { count: 5, category: None },
    ]);
    assert!(!b.qualifies(&u, &ledger()));
    u.statistics.challenges_completed = 5;
    assert!(b.qualifies(&u, &ledger()));
  }

  #[test]
  fn empty_criteria_never_qualify() {
    let b = badge(vec![]);
    assert!(!b.qualifies(&user(), &ledger()));
  }

  #[test]
  fn category_scoped_completions_use_the_ledger() {
    let u = user();
    let mut l = ledger();
    l.completed_programming = 20;
    let b = badge(vec![Criterion::ChallengesCompleted {
      count: 20,
      category: Some(Category::Programming),
    }]);
    assert!(b.qualifies(&u, &l));
    l.completed_programming = 19;
    assert!(!b.qualifies(&u, &l));
  }

  #[test]
  fn perfect_scores_use_the_ledger() {
    let u = user();
    let mut l = ledger();
    l.perfect = 1;
    let b = badge(vec![Criterion::PerfectScores { count: 1 }]);
    assert!(b.qualifies(&u, &l));
  }

  #[test]
  fn average_score_requires_at_least_one_completion() {
    // A fresh account with average 0.0 must not satisfy "average >= 0".
    let mut u = user();
    let b = badge(vec![Criterion::AverageScore { minimum: 0.0 }]);
    assert!(!b.qualifies(&u, &ledger()));
    u.statistics.record_completion(90, 10);
    assert!(b.qualifies(&u, &ledger()));
  }

  #[test]
  fn streak_criterion_reads_current_streak() {
    let mut u = user();
    u.gamification.streak.current = 7;
    let b = badge(vec![Criterion::StreakDays { days: 7 }]);
    assert!(b.qualifies(&u, &ledger()));
    u.gamification.streak.current = 6;
    assert!(!b.qualifies(&u, &ledger()));
  }
}
