//! Loading content configuration (prompts, a challenge bank, extra badges)
//! from TOML, plus the handful of environment knobs the server reads.
//!
//! See `ContentConfig` for the expected schema. Any parse or IO error is
//! logged and the server falls back to built-in defaults.

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::domain::badge::{Badge, BadgeStats, Criterion, Rarity};
use crate::domain::challenge::{
  BonusXpConfig, Category, Challenge, ChallengeContent, ChallengeStats, Difficulty, Question,
  QuestionKind, Scoring,
};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ContentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub challenges: Vec<ChallengeCfg>,
  #[serde(default)]
  pub badges: Vec<BadgeCfg>,
}

/// Prompts used by the text-generation client. Defaults suit a general tutor.
/// Override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub feedback_system: String,
  pub feedback_user_template: String,
  pub tutor_fallback: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      feedback_system: "You are an encouraging tutor reviewing a learner's challenge result. \
                        Two or three sentences: what went well, what to revisit."
        .into(),
      feedback_user_template: "Challenge: {title}\nScore: {score}/{maxScore} ({percentage}%)\n\
                               Passed: {passed}\nWrite short personalized feedback."
        .into(),
      tutor_fallback: "I'm offline right now, but keep going! Review the challenge hints and \
                       try breaking the problem into smaller steps."
        .into(),
    }
  }
}

/// Quiz challenge entry accepted in TOML configuration. Sparse on purpose;
/// unset fields take the defaults below.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeCfg {
  #[serde(default)]
  pub id: Option<String>,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub category: Category,
  #[serde(default)]
  pub difficulty: Option<Difficulty>,
  #[serde(default)]
  pub estimated_time: Option<u32>,
  #[serde(default)]
  pub xp_reward: Option<u64>,
  #[serde(default)]
  pub passing_score: Option<u32>,
  pub questions: Vec<QuestionCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  #[serde(default)]
  pub id: Option<String>,
  pub prompt: String,
  #[serde(default)]
  pub options: Vec<String>,
  pub answer: Value,
  #[serde(default)]
  pub points: Option<u32>,
}

/// Badge entry accepted in TOML. Criteria fields are all optional; the ones
/// that are set become the badge's predicate list.
#[derive(Clone, Debug, Deserialize)]
pub struct BadgeCfg {
  #[serde(default)]
  pub id: Option<String>,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub icon: Option<String>,
  #[serde(default)]
  pub rarity: Option<Rarity>,
  #[serde(default)]
  pub xp_bonus: Option<u64>,
  #[serde(default)]
  pub total_xp: Option<u64>,
  #[serde(default)]
  pub challenges_completed: Option<u64>,
  #[serde(default)]
  pub category: Option<Category>,
  #[serde(default)]
  pub perfect_scores: Option<u64>,
  #[serde(default)]
  pub streak_days: Option<u32>,
  #[serde(default)]
  pub average_score: Option<f64>,
  #[serde(default)]
  pub total_time_minutes: Option<u64>,
}

impl ChallengeCfg {
  pub fn into_challenge(self, now: chrono::DateTime<chrono::Utc>) -> Challenge {
    let questions: Vec<Question> = self
      .questions
      .into_iter()
      .map(|q| Question {
        id: q.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        kind: if q.options.is_empty() { QuestionKind::ShortAnswer } else { QuestionKind::MultipleChoice },
        prompt: q.prompt,
        options: q.options,
        correct_answer: q.answer,
        points: q.points.unwrap_or(1),
        explanation: None,
        hints: vec![],
      })
      .collect();
    let max_points: u32 = questions.iter().map(|q| q.points).sum();

    Challenge {
      id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
      title: self.title,
      description: self.description,
      category: self.category,
      tags: vec![],
      difficulty: self.difficulty.unwrap_or(Difficulty::Beginner),
      estimated_time: self.estimated_time.unwrap_or(10),
      prerequisites: vec![],
      content: ChallengeContent::Quiz { questions },
      scoring: Scoring {
        max_points,
        // Default pass mark: 60% of available points, rounded down.
        passing_score: self.passing_score.unwrap_or(max_points * 6 / 10),
        xp_reward: self.xp_reward.unwrap_or(100),
        bonus_xp: BonusXpConfig::default(),
      },
      author_id: "system".into(),
      is_published: true,
      is_active: true,
      statistics: ChallengeStats::default(),
      created_at: now,
    }
  }
}

impl BadgeCfg {
  pub fn into_badge(self, now: chrono::DateTime<chrono::Utc>) -> Badge {
    let mut criteria = Vec::new();
    if let Some(amount) = self.total_xp {
      criteria.push(Criterion::TotalXp { amount });
    }
    if let Some(count) = self.challenges_completed {
      criteria.push(Criterion::ChallengesCompleted { count, category: self.category });
    }
    if let Some(count) = self.perfect_scores {
      criteria.push(Criterion::PerfectScores { count });
    }
    if let Some(days) = self.streak_days {
      criteria.push(Criterion::StreakDays { days });
    }
    if let Some(minimum) = self.average_score {
      criteria.push(Criterion::AverageScore { minimum });
    }
    if let Some(minutes) = self.total_time_minutes {
      criteria.push(Criterion::TotalTimeSpent { minutes });
    }

    Badge {
      id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
      name: self.name,
      description: self.description,
      icon: self.icon.unwrap_or_else(|| "medal".into()),
      rarity: self.rarity.unwrap_or(Rarity::Common),
      criteria,
      xp_bonus: self.xp_bonus.unwrap_or(0),
      is_active: true,
      statistics: BadgeStats::default(),
      created_at: now,
    }
  }
}

/// Attempt to load `ContentConfig` from CONTENT_CONFIG_PATH. On any
/// parsing/IO error, returns None.
pub fn load_content_config_from_env() -> Option<ContentConfig> {
  let path = std::env::var("CONTENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ContentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "buddy_backend", %path, "Loaded content config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "buddy_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "buddy_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
