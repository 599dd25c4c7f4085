//! Challenge documents: classification, polymorphic content, scoring
//! configuration, and incrementally maintained statistics.
//!
//! Content is a tagged union with one case per challenge kind; scoring
//! dispatches on the variant instead of probing optional fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::running_average;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Programming,
  Mathematics,
  Science,
  Languages,
  Arts,
  Business,
  Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
  Expert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
  MultipleChoice,
  TrueFalse,
  FillBlank,
  ShortAnswer,
  Code,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  pub kind: QuestionKind,
  pub prompt: String,
  #[serde(default)]
  pub options: Vec<String>,
  /// Compared with type-sensitive JSON equality; no partial credit.
  pub correct_answer: Value,
  #[serde(default = "default_points")]
  pub points: u32,
  #[serde(default)]
  pub explanation: Option<String>,
  #[serde(default)]
  pub hints: Vec<String>,
}

fn default_points() -> u32 {
  1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
  pub id: String,
  pub input: String,
  pub expected_output: String,
  #[serde(default = "default_points")]
  pub points: u32,
  #[serde(default)]
  pub hidden: bool,
}

/// Polymorphic challenge content, one variant per assessable kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChallengeContent {
  Quiz {
    questions: Vec<Question>,
  },
  Coding {
    problem_statement: String,
    #[serde(default)]
    starter_code: Option<String>,
    test_cases: Vec<TestCase>,
  },
  Essay {
    prompt: String,
    #[serde(default)]
    min_words: Option<u32>,
    #[serde(default)]
    max_words: Option<u32>,
  },
  Interactive {
    description: String,
  },
}

impl ChallengeContent {
  pub fn kind_name(&self) -> &'static str {
    match self {
      ChallengeContent::Quiz { .. } => "quiz",
      ChallengeContent::Coding { .. } => "coding",
      ChallengeContent::Essay { .. } => "essay",
      ChallengeContent::Interactive { .. } => "interactive",
    }
  }
}

/// What a client submits when finishing an attempt. Mirrors the content union.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Submission {
  Quiz { responses: Vec<QuizResponse> },
  Coding { language: String, code: String, outputs: Vec<TestOutput> },
  Essay { content: String },
  Interactive {},
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
  pub question_id: String,
  pub answer: Value,
  #[serde(default)]
  pub time_spent: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutput {
  pub test_case_id: String,
  pub output: String,
}

/// Per-question grading result stored on the attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedResponse {
  pub question_id: String,
  pub user_answer: Value,
  pub correct_answer: Value,
  pub is_correct: bool,
  pub points_earned: u32,
  #[serde(default)]
  pub time_spent: Option<u64>,
}

/// Grade a submission against this content. Returns the raw score plus the
/// per-question breakdown (empty for kinds without itemized grading).
pub fn score_submission(content: &ChallengeContent, submission: &Submission) -> (u32, Vec<GradedResponse>) {
  match (content, submission) {
    (ChallengeContent::Quiz { questions }, Submission::Quiz { responses }) => {
      let mut total = 0;
      let mut graded = Vec::new();
      for resp in responses {
        let Some(q) = questions.iter().find(|q| q.id == resp.question_id) else {
          continue;
        };
        // Exact, type-sensitive equality: "1" never matches 1.
        let is_correct = resp.answer == q.correct_answer;
        let points_earned = if is_correct { q.points } else { 0 };
        total += points_earned;
        graded.push(GradedResponse {
          question_id: resp.question_id.clone(),
          user_answer: resp.answer.clone(),
          correct_answer: q.correct_answer.clone(),
          is_correct,
          points_earned,
          time_spent: resp.time_spent,
        });
      }
      (total, graded)
    }
    (ChallengeContent::Coding { test_cases, .. }, Submission::Coding { outputs, .. }) => {
      let mut total = 0;
      for case in test_cases {
        let passed = outputs
          .iter()
          .find(|o| o.test_case_id == case.id)
          .map(|o| o.output.trim() == case.expected_output.trim())
          .unwrap_or(false);
        if passed {
          total += case.points;
        }
      }
      (total, Vec::new())
    }
    // Essay and interactive submissions are not auto-graded; they finalize at
    // zero and wait for feedback.
    _ => (0, Vec::new()),
  }
}

/// Optional bonus XP amounts configured per challenge.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusXpConfig {
  #[serde(default)]
  pub perfect_score: Option<u64>,
  #[serde(default)]
  pub fast_completion: Option<u64>,
  #[serde(default)]
  pub first_attempt: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoring {
  pub max_points: u32,
  pub passing_score: u32,
  pub xp_reward: u64,
  #[serde(default)]
  pub bonus_xp: BonusXpConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
  pub challenge_id: String,
  #[serde(default = "default_true")]
  pub required: bool,
}

fn default_true() -> bool {
  true
}

/// Running statistics, updated incrementally on each finished attempt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeStats {
  pub total_attempts: u64,
  pub total_completions: u64,
  /// Average percentage across attempts.
  pub average_score: f64,
  /// Average seconds across attempts that reported a duration.
  pub average_time: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
  pub id: String,
  pub title: String,
  pub description: String,
  pub category: Category,
  #[serde(default)]
  pub tags: Vec<String>,
  pub difficulty: Difficulty,
  /// Minutes.
  pub estimated_time: u32,
  #[serde(default)]
  pub prerequisites: Vec<Prerequisite>,
  pub content: ChallengeContent,
  pub scoring: Scoring,
  pub author_id: String,
  pub is_published: bool,
  pub is_active: bool,
  pub statistics: ChallengeStats,
  pub created_at: DateTime<Utc>,
}

impl Challenge {
  pub fn is_available(&self) -> bool {
    self.is_published && self.is_active
  }

  /// Fold a finished attempt into the running statistics. Never recomputed
  /// from scratch; the incremental formula is kept deliberately.
  pub fn record_attempt(&mut self, completed: bool, percentage: u8, time_spent_secs: Option<u64>) {
    self.statistics.total_attempts += 1;
    if completed {
      self.statistics.total_completions += 1;
    }
    self.statistics.average_score = running_average(
      self.statistics.average_score,
      self.statistics.total_attempts,
      percentage as f64,
    );
    if let Some(secs) = time_spent_secs {
      self.statistics.average_time = running_average(
        self.statistics.average_time,
        self.statistics.total_attempts,
        secs as f64,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn quiz() -> ChallengeContent {
    ChallengeContent::Quiz {
      questions: vec![
        Question {
          id: "q1".into(),
          kind: QuestionKind::MultipleChoice,
          prompt: "2 + 2?".into(),
          options: vec!["3".into(), "4".into()],
          correct_answer: json!("4"),
          points: 2,
          explanation: None,
          hints: vec![],
        },
        Question {
          id: "q2".into(),
          kind: QuestionKind::TrueFalse,
          prompt: "The earth is flat.".into(),
          options: vec![],
          correct_answer: json!(false),
          points: 3,
          explanation: None,
          hints: vec![],
        },
      ],
    }
  }

  #[test]
  fn quiz_scoring_sums_matching_answers() {
    let sub = Submission::Quiz {
      responses: vec![
        QuizResponse { question_id: "q1".into(), answer: json!("4"), time_spent: None },
        QuizResponse { question_id: "q2".into(), answer: json!(true), time_spent: None },
      ],
    };
    let (score, graded) = score_submission(&quiz(), &sub);
    assert_eq!(score, 2);
    assert_eq!(graded.len(), 2);
    assert!(graded[0].is_correct);
    assert!(!graded[1].is_correct);
    assert_eq!(graded[1].points_earned, 0);
  }

  #[test]
  fn quiz_equality_is_type_sensitive() {
    let content = ChallengeContent::Quiz {
      questions: vec![Question {
        id: "q1".into(),
        kind: QuestionKind::ShortAnswer,
        prompt: "How many?".into(),
        options: vec![],
        correct_answer: json!(1),
        points: 1,
        explanation: None,
        hints: vec![],
      }],
    };
    let sub = Submission::Quiz {
      responses: vec![QuizResponse { question_id: "q1".into(), answer: json!("1"), time_spent: None }],
    };
    let (score, graded) = score_submission(&content, &sub);
    assert_eq!(score, 0);
    assert!(!graded[0].is_correct);
  }

  #[test]
  fn unknown_question_ids_are_ignored() {
    let sub = Submission::Quiz {
      responses: vec![QuizResponse { question_id: "nope".into(), answer: json!("4"), time_spent: None }],
    };
    let (score, graded) = score_submission(&quiz(), &sub);
    assert_eq!(score, 0);
    assert!(graded.is_empty());
  }

  #[test]
  fn coding_scoring_compares_trimmed_outputs() {
    let content = ChallengeContent::Coding {
      problem_statement: "sum two ints".into(),
      starter_code: None,
      test_cases: vec![
        TestCase { id: "t1".into(), input: "1 2".into(), expected_output: "3".into(), points: 2, hidden: false },
        TestCase { id: "t2".into(), input: "5 5".into(), expected_output: "10".into(), points: 3, hidden: true },
      ],
    };
    let sub = Submission::Coding {
      language: "python".into(),
      code: "print(a+b)".into(),
      outputs: vec![
        TestOutput { test_case_id: "t1".into(), output: "3\n".into() },
        TestOutput { test_case_id: "t2".into(), output: "9".into() },
      ],
    };
    let (score, _) = score_submission(&content, &sub);
    assert_eq!(score, 2);
  }

  #[test]
  fn essay_submissions_are_not_auto_scored() {
    let content = ChallengeContent::Essay { prompt: "Discuss.".into(), min_words: None, max_words: None };
    let (score, graded) = score_submission(&content, &Submission::Essay { content: "words".into() });
    assert_eq!(score, 0);
    assert!(graded.is_empty());
  }

  #[test]
  fn record_attempt_maintains_incremental_averages() {
    let mut ch = Challenge {
      id: "c1".into(),
      title: "t".into(),
      description: "d".into(),
      category: Category::Programming,
      tags: vec![],
      difficulty: Difficulty::Beginner,
      estimated_time: 10,
      prerequisites: vec![],
      content: quiz(),
      scoring: Scoring { max_points: 5, passing_score: 3, xp_reward: 100, bonus_xp: BonusXpConfig::default() },
      author_id: "a".into(),
      is_published: true,
      is_active: true,
      statistics: ChallengeStats::default(),
      created_at: Utc::now(),
    };
    ch.record_attempt(true, 80, Some(100));
    ch.record_attempt(false, 40, Some(200));
    assert_eq!(ch.statistics.total_attempts, 2);
    assert_eq!(ch.statistics.total_completions, 1);
    assert!((ch.statistics.average_score - 60.0).abs() < 1e-9);
    assert!((ch.statistics.average_time - 150.0).abs() < 1e-9);
  }
}
