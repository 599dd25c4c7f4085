//! Application state: the in-memory database, prompts, and the optional
//! text-generation client.
//!
//! All collections live inside one `Db` behind a single `RwLock`. Holding the
//! write guard across a multi-document update (submit -> XP -> streak ->
//! badges) is the transactional boundary; readers only ever see the state
//! before or after the whole update.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::config::{load_content_config_from_env, Prompts};
use crate::domain::attempt::{Attempt, AttemptStatus};
use crate::domain::badge::{AttemptLedger, Badge};
use crate::domain::challenge::{Category, Challenge};
use crate::domain::chat::ChatSession;
use crate::domain::path::{LearningPath, PathProgress};
use crate::domain::user::User;
use crate::openai::OpenAI;
use crate::seeds::{seed_badges, seed_challenges, seed_paths};

#[derive(Default)]
pub struct Db {
  pub users: HashMap<String, User>,
  pub challenges: HashMap<String, Challenge>,
  pub attempts: HashMap<String, Attempt>,
  pub paths: HashMap<String, LearningPath>,
  pub enrollments: HashMap<String, PathProgress>,
  pub badges: HashMap<String, Badge>,
  pub sessions: HashMap<String, ChatSession>,
}

impl Db {
  pub fn user_by_username(&self, username: &str) -> Option<&User> {
    self.users.values().find(|u| u.username == username)
  }

  pub fn user_by_email(&self, email: &str) -> Option<&User> {
    let needle = email.to_lowercase();
    self.users.values().find(|u| u.email.to_lowercase() == needle)
  }

  /// Attempts by one user on one challenge, oldest first.
  pub fn attempts_for(&self, user_id: &str, challenge_id: &str) -> Vec<&Attempt> {
    let mut v: Vec<&Attempt> = self
      .attempts
      .values()
      .filter(|a| a.user_id == user_id && a.challenge_id == challenge_id)
      .collect();
    v.sort_by_key(|a| a.attempt_number);
    v
  }

  pub fn user_attempts(&self, user_id: &str) -> Vec<&Attempt> {
    let mut v: Vec<&Attempt> = self.attempts.values().filter(|a| a.user_id == user_id).collect();
    v.sort_by_key(|a| a.started_at);
    v
  }

  pub fn active_attempt_id(&self, user_id: &str, challenge_id: &str) -> Option<String> {
    self
      .attempts
      .values()
      .find(|a| a.user_id == user_id && a.challenge_id == challenge_id && a.is_in_progress())
      .map(|a| a.id.clone())
  }

  pub fn next_attempt_number(&self, user_id: &str, challenge_id: &str) -> u32 {
    self
      .attempts
      .values()
      .filter(|a| a.user_id == user_id && a.challenge_id == challenge_id)
      .map(|a| a.attempt_number)
      .max()
      .unwrap_or(0)
      + 1
  }

  pub fn enrollment(&self, user_id: &str, path_id: &str) -> Option<&PathProgress> {
    self.enrollments.values().find(|e| e.user_id == user_id && e.path_id == path_id)
  }

  pub fn enrollment_mut(&mut self, user_id: &str, path_id: &str) -> Option<&mut PathProgress> {
    self.enrollments.values_mut().find(|e| e.user_id == user_id && e.path_id == path_id)
  }

  pub fn user_enrollments(&self, user_id: &str) -> Vec<&PathProgress> {
    self.enrollments.values().filter(|e| e.user_id == user_id).collect()
  }
}

impl AttemptLedger for Db {
  fn completed_count(&self, user_id: &str, category: Option<Category>) -> u64 {
    self
      .attempts
      .values()
      .filter(|a| a.user_id == user_id && a.status == AttemptStatus::Completed)
      .filter(|a| match category {
        Some(cat) => self.challenges.get(&a.challenge_id).map(|c| c.category == cat).unwrap_or(false),
        None => true,
      })
      .count() as u64
  }

  fn perfect_count(&self, user_id: &str) -> u64 {
    self
      .attempts
      .values()
      .filter(|a| a.user_id == user_id && a.status == AttemptStatus::Completed && a.percentage == 100)
      .count() as u64
  }
}

#[derive(Clone)]
pub struct AppState {
  pub db: Arc<RwLock<Db>>,
  pub openai: Option<OpenAI>,
  pub prompts: Prompts,
  pub token_secret: Arc<String>,
}

impl AppState {
  /// Build state from env: load config, seed content, init the model client.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let now = Utc::now();
    let cfg_opt = load_content_config_from_env();
    let prompts = cfg_opt.as_ref().map(|c| c.prompts.clone()).unwrap_or_default();

    let mut db = Db::default();

    // Config-bank content first, then built-in seeds without overwriting ids.
    let mut bank_challenges = 0usize;
    let mut bank_badges = 0usize;
    if let Some(cfg) = cfg_opt {
      for cc in cfg.challenges {
        let ch = cc.into_challenge(now);
        db.challenges.insert(ch.id.clone(), ch);
        bank_challenges += 1;
      }
      for bc in cfg.badges {
        let b = bc.into_badge(now);
        db.badges.insert(b.id.clone(), b);
        bank_badges += 1;
      }
    }
    for ch in seed_challenges(now) {
      db.challenges.entry(ch.id.clone()).or_insert(ch);
    }
    for b in seed_badges(now) {
      db.badges.entry(b.id.clone()).or_insert(b);
    }
    for p in seed_paths(now) {
      db.paths.entry(p.id.clone()).or_insert(p);
    }

    info!(
      target: "challenge",
      total = db.challenges.len(),
      from_config = bank_challenges,
      "Startup challenge inventory"
    );
    info!(
      target: "badge",
      total = db.badges.len(),
      from_config = bank_badges,
      "Startup badge inventory"
    );
    info!(target: "path", total = db.paths.len(), "Startup path inventory");

    let openai = OpenAI::from_env();
    if let Some(oa) = &openai {
      info!(target: "buddy_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
    } else {
      info!(target: "buddy_backend", "OpenAI disabled (no OPENAI_API_KEY). Tutor uses canned replies.");
    }

    let token_secret = std::env::var("TOKEN_SECRET").unwrap_or_else(|_| {
      warn!(target: "buddy_backend", "TOKEN_SECRET not set; using an insecure development secret");
      "insecure-dev-secret".into()
    });

    Self {
      db: Arc::new(RwLock::new(db)),
      openai,
      prompts,
      token_secret: Arc::new(token_secret),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::user::Profile;

  fn db_with_user() -> (Db, String) {
    let mut db = Db::default();
    let u = User::new("ana".into(), "Ana@Example.com".into(), "digest".into(), Profile::default(), Utc::now());
    let id = u.id.clone();
    db.users.insert(id.clone(), u);
    (db, id)
  }

  #[test]
  fn email_lookup_is_case_insensitive() {
    let (db, _) = db_with_user();
    assert!(db.user_by_email("ana@example.com").is_some());
    assert!(db.user_by_email("ANA@EXAMPLE.COM").is_some());
    assert!(db.user_by_email("bob@example.com").is_none());
  }

  #[test]
  fn attempt_numbers_start_at_one() {
    let (db, uid) = db_with_user();
    assert_eq!(db.next_attempt_number(&uid, "c1"), 1);
  }

  #[test]
  fn ledger_counts_only_completed_attempts() {
    let (mut db, uid) = db_with_user();
    for ch in seed_challenges(Utc::now()) {
      db.challenges.insert(ch.id.clone(), ch);
    }
    let math = db.challenges.get("seed-math-basics").unwrap().clone();
    let code = db.challenges.get("seed-python-fizzbuzz").unwrap().clone();

    let now = Utc::now();
    let mut a1 = Attempt::start(&uid, &math, 1, now);
    a1.finalize(5, vec![], 3, now);
    let a2 = Attempt::start(&uid, &code, 1, now); // still in progress
    db.attempts.insert(a1.id.clone(), a1);
    db.attempts.insert(a2.id.clone(), a2);

    assert_eq!(db.completed_count(&uid, None), 1);
    assert_eq!(db.completed_count(&uid, Some(Category::Mathematics)), 1);
    assert_eq!(db.completed_count(&uid, Some(Category::Programming)), 0);
    assert_eq!(db.perfect_count(&uid), 1);
  }
}
