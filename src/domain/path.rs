//! Learning paths (ordered curricula) and per-user enrollment progress.
//!
//! Progress percentage is derived from completed steps; milestones are
//! recorded at most once per threshold per enrollment, and completion flips
//! exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::challenge::{Category, Difficulty};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStep {
  pub step_number: u32,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Optional link to an assessable challenge.
  #[serde(default)]
  pub challenge_id: Option<String>,
  pub xp_reward: u64,
  /// Step numbers (earlier in this path) that must be done first.
  #[serde(default)]
  pub prerequisites: Vec<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStats {
  pub enrollments: u64,
  pub completions: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
  pub id: String,
  pub title: String,
  pub description: String,
  pub category: Category,
  pub difficulty: Difficulty,
  pub steps: Vec<PathStep>,
  pub total_steps: u32,
  pub is_published: bool,
  pub is_active: bool,
  pub statistics: PathStats,
  pub created_at: DateTime<Utc>,
}

impl LearningPath {
  pub fn is_available(&self) -> bool {
    self.is_published && self.is_active
  }

  pub fn step(&self, step_number: u32) -> Option<&PathStep> {
    self.steps.iter().find(|s| s.step_number == step_number)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStatus {
  Enrolled,
  InProgress,
  Completed,
  Paused,
  Dropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneKind {
  Quarter,
  Half,
  ThreeQuarter,
  Completion,
}

impl MilestoneKind {
  pub fn threshold(self) -> u8 {
    match self {
      MilestoneKind::Quarter => 25,
      MilestoneKind::Half => 50,
      MilestoneKind::ThreeQuarter => 75,
      MilestoneKind::Completion => 100,
    }
  }

  pub fn xp_bonus(self) -> u64 {
    match self {
      MilestoneKind::Quarter => 50,
      MilestoneKind::Half => 100,
      MilestoneKind::ThreeQuarter => 150,
      MilestoneKind::Completion => 500,
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      MilestoneKind::Quarter => "25% of learning path completed",
      MilestoneKind::Half => "50% of learning path completed",
      MilestoneKind::ThreeQuarter => "75% of learning path completed",
      MilestoneKind::Completion => "Learning path completed!",
    }
  }

  const ALL: [MilestoneKind; 4] = [
    MilestoneKind::Quarter,
    MilestoneKind::Half,
    MilestoneKind::ThreeQuarter,
    MilestoneKind::Completion,
  ];
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
  pub kind: MilestoneKind,
  pub achieved_at: DateTime<Utc>,
  pub description: String,
  pub xp_bonus: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStep {
  pub step_number: u32,
  pub completed_at: DateTime<Utc>,
  #[serde(default)]
  pub score: Option<u8>,
  /// Seconds.
  pub time_spent: u64,
  pub xp_earned: u64,
}

/// Data reported when completing a step.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
  #[serde(default)]
  pub score: Option<u8>,
  #[serde(default)]
  pub time_spent: u64,
  #[serde(default)]
  pub xp_earned: Option<u64>,
}

/// What one `complete_step` call changed, for the caller to act on.
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
  pub new_milestones: Vec<Milestone>,
  /// True exactly once per enrollment, when progress first reaches 100%.
  pub path_completed: bool,
  /// Step XP plus milestone bonuses, to be awarded to the user.
  pub xp_awarded: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathProgress {
  pub id: String,
  pub user_id: String,
  pub path_id: String,
  pub status: PathStatus,
  pub completed: bool,

  pub enrolled_at: DateTime<Utc>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,

  pub current_step: u32,
  pub completed_steps: Vec<CompletedStep>,
  pub progress_percentage: u8,
  /// Seconds.
  pub total_time_spent: u64,
  pub total_xp_earned: u64,
  pub average_score: f64,
  pub milestones: Vec<Milestone>,
  pub last_activity: DateTime<Utc>,
}

impl PathProgress {
  pub fn enroll(user_id: &str, path_id: &str, now: DateTime<Utc>) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      user_id: user_id.to_string(),
      path_id: path_id.to_string(),
      status: PathStatus::Enrolled,
      completed: false,
      enrolled_at: now,
      started_at: None,
      completed_at: None,
      current_step: 1,
      completed_steps: Vec::new(),
      progress_percentage: 0,
      total_time_spent: 0,
      total_xp_earned: 0,
      average_score: 0.0,
      milestones: Vec::new(),
      last_activity: now,
    }
  }

  fn has_milestone(&self, kind: MilestoneKind) -> bool {
    self.milestones.iter().any(|m| m.kind == kind)
  }

  /// Complete (or re-complete) a step. Re-completion merges the new data into
  /// the existing record instead of duplicating it and awards no XP again;
  /// `current_step` never decreases. Milestone thresholds fire the first time
  /// progress crosses them, and 100% marks the enrollment completed
  /// permanently.
  pub fn complete_step(
    &mut self,
    step_xp_reward: u64,
    total_steps: u32,
    step_number: u32,
    data: StepResult,
    now: DateTime<Utc>,
  ) -> StepOutcome {
    let xp_earned = data.xp_earned.unwrap_or(step_xp_reward);

    let first_completion = match self
      .completed_steps
      .iter_mut()
      .find(|s| s.step_number == step_number)
    {
      Some(existing) => {
        existing.completed_at = now;
        existing.score = data.score.or(existing.score);
        existing.time_spent = data.time_spent;
        false
      }
      None => {
        self.completed_steps.push(CompletedStep {
          step_number,
          completed_at: now,
          score: data.score,
          time_spent: data.time_spent,
          xp_earned,
        });
        true
      }
    };

    self.current_step = self.current_step.max(step_number + 1);

    if self.status == PathStatus::Enrolled {
      self.status = PathStatus::InProgress;
      self.started_at = Some(now);
    }

    self.recompute_rollups(total_steps);
    self.last_activity = now;

    // Record any thresholds crossed for the first time.
    let mut outcome = StepOutcome {
      xp_awarded: if first_completion { xp_earned } else { 0 },
      ..StepOutcome::default()
    };
    for kind in MilestoneKind::ALL {
      if self.progress_percentage >= kind.threshold() && !self.has_milestone(kind) {
        let milestone = Milestone {
          kind,
          achieved_at: now,
          description: kind.description().to_string(),
          xp_bonus: kind.xp_bonus(),
        };
        outcome.xp_awarded += milestone.xp_bonus;
        self.milestones.push(milestone.clone());
        outcome.new_milestones.push(milestone);
      }
    }
    if !outcome.new_milestones.is_empty() {
      // The recompute is the single place milestone bonuses enter the totals.
      self.recompute_rollups(total_steps);
    }

    if self.progress_percentage >= 100 && !self.completed {
      self.completed = true;
      self.completed_at = Some(now);
      self.status = PathStatus::Completed;
      outcome.path_completed = true;
    }

    outcome
  }

  fn recompute_rollups(&mut self, total_steps: u32) {
    self.progress_percentage = if total_steps == 0 {
      0
    } else {
      crate::util::percentage(self.completed_steps.len() as u32, total_steps)
    };
    self.total_time_spent = self.completed_steps.iter().map(|s| s.time_spent).sum();
    self.total_xp_earned = self.completed_steps.iter().map(|s| s.xp_earned).sum::<u64>()
      + self.milestones.iter().map(|m| m.xp_bonus).sum::<u64>();

    let scored: Vec<u8> = self.completed_steps.iter().filter_map(|s| s.score).collect();
    if !scored.is_empty() {
      self.average_score = scored.iter().map(|s| *s as f64).sum::<f64>() / scored.len() as f64;
    }
  }
}
