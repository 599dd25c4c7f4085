//! Attempt records: one per (user, challenge, attempt number), moving through
//! a small state machine: in-progress -> completed | abandoned | failed.
//! Percentage and pass/fail are derived, never set independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::challenge::{Challenge, GradedResponse};
use crate::util::percentage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
  InProgress,
  Completed,
  Abandoned,
  Failed,
}

/// Bonus-XP breakdown recorded on the attempt when triggers fire.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusXp {
  pub perfect_score: u64,
  pub fast_completion: u64,
  pub first_attempt: u64,
}

impl BonusXp {
  pub fn total(&self) -> u64 {
    self.perfect_score + self.fast_completion + self.first_attempt
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
  pub id: String,
  pub user_id: String,
  pub challenge_id: String,
  /// Strictly increasing per (user, challenge), starting at 1.
  pub attempt_number: u32,
  pub status: AttemptStatus,
  pub completed: bool,

  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Seconds, derived from completed_at - started_at.
  pub time_spent: u64,
  /// Snapshot of the challenge's estimated minutes at start time.
  pub estimated_time: u32,

  pub score: u32,
  /// Snapshot of the challenge's max points at start time, not live-linked.
  pub max_possible_score: u32,
  pub percentage: u8,
  pub passed: bool,

  pub responses: Vec<GradedResponse>,
  pub xp_earned: u64,
  pub bonus_xp: BonusXp,
}

impl Attempt {
  pub fn start(user_id: &str, challenge: &Challenge, attempt_number: u32, now: DateTime<Utc>) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      user_id: user_id.to_string(),
      challenge_id: challenge.id.clone(),
      attempt_number,
      status: AttemptStatus::InProgress,
      completed: false,
      started_at: now,
      completed_at: None,
      time_spent: 0,
      estimated_time: challenge.estimated_time,
      score: 0,
      max_possible_score: challenge.scoring.max_points,
      percentage: 0,
      passed: false,
      responses: Vec::new(),
      xp_earned: 0,
      bonus_xp: BonusXp::default(),
    }
  }

  pub fn is_in_progress(&self) -> bool {
    self.status == AttemptStatus::InProgress
  }

  /// Finalize the attempt with a graded score. Derives time spent, percentage
  /// and pass/fail; the record is immutable afterwards except for feedback.
  pub fn finalize(
    &mut self,
    score: u32,
    responses: Vec<GradedResponse>,
    passing_score: u32,
    now: DateTime<Utc>,
  ) {
    self.score = score;
    self.responses = responses;
    self.completed_at = Some(now);
    self.time_spent = (now - self.started_at).num_seconds().max(0) as u64;
    self.percentage = percentage(self.score, self.max_possible_score);
    self.passed = self.score >= passing_score;
    self.status = AttemptStatus::Completed;
    self.completed = true;
  }

  /// Compute the XP this attempt earns: the challenge's base reward plus each
  /// independently-triggered bonus. Records the breakdown on the attempt.
  pub fn calculate_xp(&mut self, challenge: &Challenge) -> u64 {
    let base = challenge.scoring.xp_reward;
    let cfg = &challenge.scoring.bonus_xp;

    if self.percentage == 100 {
      if let Some(bonus) = cfg.perfect_score {
        self.bonus_xp.perfect_score = bonus;
      }
    }
    if (self.time_spent as f64) < self.estimated_time as f64 * 60.0 * 0.8 {
      if let Some(bonus) = cfg.fast_completion {
        self.bonus_xp.fast_completion = bonus;
      }
    }
    if self.attempt_number == 1 && self.passed {
      if let Some(bonus) = cfg.first_attempt {
        self.bonus_xp.first_attempt = bonus;
      }
    }

    self.xp_earned = base + self.bonus_xp.total();
    self.xp_earned
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::challenge::{
    BonusXpConfig, Category, ChallengeContent, ChallengeStats, Difficulty, Question, QuestionKind,
    Scoring,
  };
  use chrono::Duration;
  use serde_json::json;

  fn challenge(max_points: u32, passing: u32) -> Challenge {
    Challenge {
      id: "c1".into(),
      title: "t".into(),
      description: "d".into(),
      category: Category::Mathematics,
      tags: vec![],
      difficulty: Difficulty::Beginner,
      estimated_time: 10,
      prerequisites: vec![],
      content: ChallengeContent::Quiz {
        questions: vec![Question {
          id: "q1".into(),
          kind: QuestionKind::ShortAnswer,
          prompt: "p".into(),
          options: vec![],
          correct_answer: json!("a"),
          points: max_points,
          explanation: None,
          hints: vec![],
        }],
      },
      scoring: Scoring {
        max_points,
        passing_score: passing,
        xp_reward: 100,
        bonus_xp: BonusXpConfig {
          perfect_score: Some(50),
          fast_completion: Some(25),
          first_attempt: Some(10),
        },
      },
      author_id: "a".into(),
      is_published: true,
      is_active: true,
      statistics: ChallengeStats::default(),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn percentage_and_passed_are_derived() {
    let ch = challenge(4, 3);
    let start = Utc::now();
    let mut a = Attempt::start("u1", &ch, 1, start);
    a.finalize(3, vec![], ch.scoring.passing_score, start + Duration::seconds(30));
    assert_eq!(a.percentage, 75);
    assert!(a.passed);
    assert_eq!(a.time_spent, 30);
    assert_eq!(a.status, AttemptStatus::Completed);
  }

  #[test]
  fn zero_max_score_yields_zero_percentage() {
    let mut ch = challenge(4, 3);
    ch.scoring.max_points = 0;
    let start = Utc::now();
    let mut a = Attempt::start("u1", &ch, 1, start);
    a.finalize(0, vec![], ch.scoring.passing_score, start + Duration::seconds(5));
    assert_eq!(a.percentage, 0);
  }

  #[test]
  fn perfect_fast_first_bonuses_stack() {
    // 4/4 in half the estimated time on attempt one: all three triggers fire.
    let ch = challenge(4, 3);
    let start = Utc::now();
    let mut a = Attempt::start("u1", &ch, 1, start);
    a.finalize(4, vec![], ch.scoring.passing_score, start + Duration::seconds(300));
    assert_eq!(a.percentage, 100);
    assert!(a.passed);
    let xp = a.calculate_xp(&ch);
    assert_eq!(a.bonus_xp.perfect_score, 50);
    assert_eq!(a.bonus_xp.fast_completion, 25);
    assert_eq!(a.bonus_xp.first_attempt, 10);
    assert_eq!(xp, 185);
  }

  #[test]
  fn slow_imperfect_retry_earns_base_only() {
    let ch = challenge(4, 3);
    let start = Utc::now();
    let mut a = Attempt::start("u1", &ch, 2, start);
    // 80% of 10 minutes is 480s; 500s is too slow for the bonus.
    a.finalize(3, vec![], ch.scoring.passing_score, start + Duration::seconds(500));
    let xp = a.calculate_xp(&ch);
    assert_eq!(xp, 100);
    assert_eq!(a.bonus_xp.total(), 0);
  }

  #[test]
  fn first_attempt_bonus_requires_passing() {
    let ch = challenge(4, 3);
    let start = Utc::now();
    let mut a = Attempt::start("u1", &ch, 1, start);
    a.finalize(1, vec![], ch.scoring.passing_score, start + Duration::seconds(500));
    a.calculate_xp(&ch);
    assert_eq!(a.bonus_xp.first_attempt, 0);
  }
}
