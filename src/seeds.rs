//! Built-in seed content: starter badges, a few sample challenges, and one
//! sample learning path, so a fresh server is usable with no config file.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::badge::{Badge, BadgeStats, Criterion, Rarity};
use crate::domain::challenge::{
  BonusXpConfig, Category, Challenge, ChallengeContent, ChallengeStats, Difficulty, Question,
  QuestionKind, Scoring, TestCase,
};
use crate::domain::path::{LearningPath, PathStats, PathStep};

fn badge(
  id: &str,
  name: &str,
  description: &str,
  icon: &str,
  rarity: Rarity,
  criteria: Vec<Criterion>,
  xp_bonus: u64,
  now: DateTime<Utc>,
) -> Badge {
  Badge {
    id: id.into(),
    name: name.into(),
    description: description.into(),
    icon: icon.into(),
    rarity,
    criteria,
    xp_bonus,
    is_active: true,
    statistics: BadgeStats::default(),
    created_at: now,
  }
}

pub fn seed_badges(now: DateTime<Utc>) -> Vec<Badge> {
  vec![
    badge(
      "badge-first-steps",
      "First Steps",
      "Complete your first challenge",
      "baby-steps",
      Rarity::Common,
      vec![Criterion::ChallengesCompleted { count: 1, category: None }],
      50,
      now,
    ),
    badge(
      "badge-quick-learner",
      "Quick Learner",
      "Complete 5 challenges",
      "lightning",
      Rarity::Common,
      vec![Criterion::ChallengesCompleted { count: 5, category: None }],
      100,
      now,
    ),
    badge(
      "badge-perfect-score",
      "Perfect Score",
      "Get a 100% score on any challenge",
      "bullseye",
      Rarity::Uncommon,
      vec![Criterion::PerfectScores { count: 1 }],
      150,
      now,
    ),
    badge(
      "badge-streak-master",
      "Streak Master",
      "Keep a 7-day learning streak",
      "flame",
      Rarity::Rare,
      vec![Criterion::StreakDays { days: 7 }],
      200,
      now,
    ),
    badge(
      "badge-knowledge-seeker",
      "Knowledge Seeker",
      "Complete 50 challenges",
      "owl",
      Rarity::Epic,
      vec![Criterion::ChallengesCompleted { count: 50, category: None }],
      500,
      now,
    ),
    badge(
      "badge-programming-prodigy",
      "Programming Prodigy",
      "Complete 20 programming challenges",
      "terminal",
      Rarity::Rare,
      vec![Criterion::ChallengesCompleted { count: 20, category: Some(Category::Programming) }],
      300,
      now,
    ),
  ]
}

fn question(id: &str, kind: QuestionKind, prompt: &str, options: &[&str], answer: serde_json::Value, points: u32) -> Question {
  Question {
    id: id.into(),
    kind,
    prompt: prompt.into(),
    options: options.iter().map(|s| s.to_string()).collect(),
    correct_answer: answer,
    points,
    explanation: None,
    hints: vec![],
  }
}

pub fn seed_challenges(now: DateTime<Utc>) -> Vec<Challenge> {
  vec![
    Challenge {
      id: "seed-math-basics".into(),
      title: "Arithmetic Warm-up".into(),
      description: "Quick checks on everyday arithmetic.".into(),
      category: Category::Mathematics,
      tags: vec!["arithmetic".into(), "warmup".into()],
      difficulty: Difficulty::Beginner,
      estimated_time: 5,
      prerequisites: vec![],
      content: ChallengeContent::Quiz {
        questions: vec![
          question("q1", QuestionKind::MultipleChoice, "What is 7 x 8?", &["54", "56", "64"], json!("56"), 2),
          question("q2", QuestionKind::TrueFalse, "17 is a prime number.", &[], json!(true), 1),
          question("q3", QuestionKind::ShortAnswer, "What is 100 / 4?", &[], json!("25"), 2),
        ],
      },
      scoring: Scoring {
        max_points: 5,
        passing_score: 3,
        xp_reward: 50,
        bonus_xp: BonusXpConfig { perfect_score: Some(25), fast_completion: Some(10), first_attempt: Some(10) },
      },
      author_id: "system".into(),
      is_published: true,
      is_active: true,
      statistics: ChallengeStats::default(),
      created_at: now,
    },
    Challenge {
      id: "seed-python-fizzbuzz".into(),
      title: "FizzBuzz".into(),
      description: "The classic: print numbers, with multiples of 3 and 5 replaced.".into(),
      category: Category::Programming,
      tags: vec!["python".into(), "loops".into()],
      difficulty: Difficulty::Beginner,
      estimated_time: 15,
      prerequisites: vec![],
      content: ChallengeContent::Coding {
        problem_statement: "Write a program that reads n and prints 1..n, replacing multiples \
                            of 3 with Fizz, of 5 with Buzz, of both with FizzBuzz."
          .into(),
        starter_code: Some("n = int(input())\n".into()),
        test_cases: vec![
          TestCase { id: "t1".into(), input: "3".into(), expected_output: "1\n2\nFizz".into(), points: 2, hidden: false },
          TestCase { id: "t2".into(), input: "5".into(), expected_output: "1\n2\nFizz\n4\nBuzz".into(), points: 3, hidden: false },
          TestCase { id: "t3".into(), input: "15".into(), expected_output: "1\n2\nFizz\n4\nBuzz\nFizz\n7\n8\nFizz\nBuzz\n11\nFizz\n13\n14\nFizzBuzz".into(), points: 5, hidden: true },
        ],
      },
      scoring: Scoring {
        max_points: 10,
        passing_score: 5,
        xp_reward: 150,
        bonus_xp: BonusXpConfig { perfect_score: Some(50), fast_completion: Some(25), first_attempt: Some(25) },
      },
      author_id: "system".into(),
      is_published: true,
      is_active: true,
      statistics: ChallengeStats::default(),
      created_at: now,
    },
    Challenge {
      id: "seed-science-cells".into(),
      title: "Cell Biology Basics".into(),
      description: "Organelles and what they do.".into(),
      category: Category::Science,
      tags: vec!["biology".into()],
      difficulty: Difficulty::Intermediate,
      estimated_time: 10,
      prerequisites: vec![],
      content: ChallengeContent::Quiz {
        questions: vec![
          question(
            "q1",
            QuestionKind::MultipleChoice,
            "Which organelle produces most of a cell's ATP?",
            &["Nucleus", "Mitochondrion", "Ribosome"],
            json!("Mitochondrion"),
            2,
          ),
          question("q2", QuestionKind::TrueFalse, "Plant cells have cell walls.", &[], json!(true), 1),
        ],
      },
      scoring: Scoring {
        max_points: 3,
        passing_score: 2,
        xp_reward: 75,
        bonus_xp: BonusXpConfig { perfect_score: Some(30), fast_completion: None, first_attempt: Some(15) },
      },
      author_id: "system".into(),
      is_published: true,
      is_active: true,
      statistics: ChallengeStats::default(),
      created_at: now,
    },
  ]
}

pub fn seed_paths(now: DateTime<Utc>) -> Vec<LearningPath> {
  vec![LearningPath {
    id: "seed-path-foundations".into(),
    title: "Learning Foundations".into(),
    description: "A gentle on-ramp: numbers, a first program, and how cells work.".into(),
    category: Category::Other,
    difficulty: Difficulty::Beginner,
    steps: vec![
      PathStep {
        step_number: 1,
        title: "Warm up with arithmetic".into(),
        description: Some("Shake off the rust.".into()),
        challenge_id: Some("seed-math-basics".into()),
        xp_reward: 25,
        prerequisites: vec![],
      },
      PathStep {
        step_number: 2,
        title: "Write your first program".into(),
        description: Some("FizzBuzz, the rite of passage.".into()),
        challenge_id: Some("seed-python-fizzbuzz".into()),
        xp_reward: 50,
        prerequisites: vec![1],
      },
      PathStep {
        step_number: 3,
        title: "Peek inside a cell".into(),
        description: None,
        challenge_id: Some("seed-science-cells".into()),
        xp_reward: 25,
        prerequisites: vec![1],
      },
      PathStep {
        step_number: 4,
        title: "Reflect on what you learned".into(),
        description: Some("No challenge here; jot down your takeaways.".into()),
        challenge_id: None,
        xp_reward: 25,
        prerequisites: vec![2, 3],
      },
    ],
    total_steps: 4,
    is_published: true,
    is_active: true,
    statistics: PathStats::default(),
    created_at: now,
  }]
}
