//! The write-side core: starting and submitting challenge attempts.
//!
//! Both operations take `&mut Db`, so the caller's write guard spans the whole
//! update (attempt, challenge stats, user XP/streak, badge sweep). Readers see
//! the state before or after, never in between.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::badges::{check_and_award_badges, AwardedBadge};
use crate::domain::attempt::{Attempt, AttemptStatus, BonusXp};
use crate::domain::challenge::{score_submission, Submission};
use crate::domain::user::LevelUp;
use crate::error::ApiError;
use crate::store::Db;

/// An in-progress attempt older than this is written off as failed and a
/// fresh one started in its place.
const STALE_ATTEMPT_HOURS: i64 = 24;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
  pub attempt: Attempt,
  /// True when an existing in-progress attempt was returned unchanged.
  pub resumed: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
  pub attempt: Attempt,
  pub xp_earned: u64,
  pub bonus_xp: BonusXp,
  pub level: LevelUp,
  pub streak: u32,
  pub new_badges: Vec<AwardedBadge>,
}

/// Start (or resume) an attempt on a challenge.
#[instrument(level = "info", skip(db, now), fields(%user_id, %challenge_id))]
pub fn start_attempt(
  db: &mut Db,
  user_id: &str,
  challenge_id: &str,
  now: DateTime<Utc>,
) -> Result<StartOutcome, ApiError> {
  let challenge = db
    .challenges
    .get(challenge_id)
    .filter(|c| c.is_available())
    .ok_or(ApiError::NotFound("Challenge"))?
    .clone();

  // Every required prerequisite needs a completed attempt on record.
  let missing: Vec<String> = challenge
    .prerequisites
    .iter()
    .filter(|p| p.required)
    .filter(|p| {
      !db.attempts_for(user_id, &p.challenge_id)
        .iter()
        .any(|a| a.status == AttemptStatus::Completed)
    })
    .map(|p| p.challenge_id.clone())
    .collect();
  if !missing.is_empty() {
    return Err(ApiError::PrerequisitesNotMet { missing });
  }

  if let Some(active_id) = db.active_attempt_id(user_id, challenge_id) {
    let attempt = db.attempts.get_mut(&active_id).ok_or_else(|| {
      ApiError::Internal("active attempt vanished under the write guard".into())
    })?;
    if now - attempt.started_at < Duration::hours(STALE_ATTEMPT_HOURS) {
      info!(target: "challenge", attempt = %attempt.id, number = attempt.attempt_number, "Resuming in-progress attempt");
      return Ok(StartOutcome { attempt: attempt.clone(), resumed: true });
    }
    // Too old to resume meaningfully.
    warn!(target: "challenge", attempt = %attempt.id, "Marking stale in-progress attempt as failed");
    attempt.status = AttemptStatus::Failed;
  }

  let number = db.next_attempt_number(user_id, challenge_id);
  let attempt = Attempt::start(user_id, &challenge, number, now);
  info!(target: "challenge", attempt = %attempt.id, number, "Started attempt");
  db.attempts.insert(attempt.id.clone(), attempt.clone());
  Ok(StartOutcome { attempt, resumed: false })
}

/// Grade and finalize the active attempt, then run every follow-on update
/// under the same guard: challenge statistics, user statistics, XP, streak,
/// and the badge sweep.
#[instrument(level = "info", skip(db, submission, now), fields(%user_id, %challenge_id))]
pub fn submit_attempt(
  db: &mut Db,
  user_id: &str,
  challenge_id: &str,
  submission: &Submission,
  now: DateTime<Utc>,
) -> Result<SubmitOutcome, ApiError> {
  let challenge = db
    .challenges
    .get(challenge_id)
    .ok_or(ApiError::NotFound("Challenge"))?
    .clone();
  let attempt_id = db
    .active_attempt_id(user_id, challenge_id)
    .ok_or(ApiError::NoActiveAttempt)?;

  let (score, graded) = score_submission(&challenge.content, submission);

  let attempt = db
    .attempts
    .get_mut(&attempt_id)
    .ok_or_else(|| ApiError::Internal("active attempt vanished under the write guard".into()))?;
  attempt.finalize(score, graded, challenge.scoring.passing_score, now);
  let xp_earned = attempt.calculate_xp(&challenge);
  let attempt = attempt.clone();

  if let Some(ch) = db.challenges.get_mut(challenge_id) {
    ch.record_attempt(true, attempt.percentage, Some(attempt.time_spent));
  }

  let user = db.users.get_mut(user_id).ok_or(ApiError::NotFound("User"))?;
  user.statistics.record_completion(attempt.percentage, attempt.time_spent / 60);
  let level = user.gamification.award_xp(xp_earned);
  user.gamification.update_streak(now);
  let streak = user.gamification.streak.current;

  if level.leveled_up {
    info!(target: "challenge", %user_id, new_level = level.new_level, "Level up");
  }
  info!(
    target: "challenge",
    attempt = %attempt.id,
    kind = challenge.content.kind_name(),
    score,
    percentage = attempt.percentage,
    passed = attempt.passed,
    xp_earned,
    "Attempt submitted"
  );

  let new_badges = check_and_award_badges(db, user_id, now);

  Ok(SubmitOutcome {
    bonus_xp: attempt.bonus_xp.clone(),
    attempt,
    xp_earned,
    level,
    streak,
    new_badges,
  })
}

/// Abandon the active attempt. Terminal, keeps the record for the ledger.
/// Challenge statistics only fold in on submit, so the running averages never
/// see an abandoned attempt.
#[instrument(level = "info", skip(db, now), fields(%user_id, %challenge_id))]
pub fn abandon_attempt(
  db: &mut Db,
  user_id: &str,
  challenge_id: &str,
  now: DateTime<Utc>,
) -> Result<Attempt, ApiError> {
  let attempt_id = db
    .active_attempt_id(user_id, challenge_id)
    .ok_or(ApiError::NoActiveAttempt)?;
  let attempt = db
    .attempts
    .get_mut(&attempt_id)
    .ok_or_else(|| ApiError::Internal("active attempt vanished under the write guard".into()))?;
  attempt.status = AttemptStatus::Abandoned;
  attempt.completed_at = Some(now);
  attempt.time_spent = (now - attempt.started_at).num_seconds().max(0) as u64;
  Ok(attempt.clone())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::challenge::{Prerequisite, QuizResponse};
  use crate::domain::user::{Profile, User};
  use crate::seeds::{seed_badges, seed_challenges};
  use serde_json::json;

  fn fresh_db() -> (Db, String) {
    let now = Utc::now();
    let mut db = Db::default();
    for ch in seed_challenges(now) {
      db.challenges.insert(ch.id.clone(), ch);
    }
    for b in seed_badges(now) {
      db.badges.insert(b.id.clone(), b);
    }
    let u = User::new("ana".into(), "ana@example.com".into(), "digest".into(), Profile::default(), now);
    let id = u.id.clone();
    db.users.insert(id.clone(), u);
    (db, id)
  }

  fn full_marks_quiz() -> Submission {
    Submission::Quiz {
      responses: vec![
        QuizResponse { question_id: "q1".into(), answer: json!("56"), time_spent: None },
        QuizResponse { question_id: "q2".into(), answer: json!(true), time_spent: None },
        QuizResponse { question_id: "q3".into(), answer: json!("25"), time_spent: None },
      ],
    }
  }

  #[test]
  fn start_is_resumable_and_numbering_increments() {
    let (mut db, uid) = fresh_db();
    let now = Utc::now();

    let first = start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    assert!(!first.resumed);
    assert_eq!(first.attempt.attempt_number, 1);

    let resumed = start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    assert!(resumed.resumed);
    assert_eq!(resumed.attempt.id, first.attempt.id);

    submit_attempt(&mut db, &uid, "seed-math-basics", &full_marks_quiz(), now).unwrap();
    let second = start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    assert!(!second.resumed);
    assert_eq!(second.attempt.attempt_number, 2);
  }

  #[test]
  fn unpublished_challenge_cannot_be_started() {
    let (mut db, uid) = fresh_db();
    db.challenges.get_mut("seed-math-basics").unwrap().is_published = false;
    let err = start_attempt(&mut db, &uid, "seed-math-basics", Utc::now()).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
  }

  #[test]
  fn missing_prerequisites_are_enumerated() {
    let (mut db, uid) = fresh_db();
    db.challenges.get_mut("seed-python-fizzbuzz").unwrap().prerequisites =
      vec![Prerequisite { challenge_id: "seed-math-basics".into(), required: true }];

    let err = start_attempt(&mut db, &uid, "seed-python-fizzbuzz", Utc::now()).unwrap_err();
    match err {
      ApiError::PrerequisitesNotMet { missing } => assert_eq!(missing, vec!["seed-math-basics"]),
      other => panic!("unexpected error: {other}"),
    }

    // Completing the prerequisite unblocks the start.
    let now = Utc::now();
    start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    submit_attempt(&mut db, &uid, "seed-math-basics", &full_marks_quiz(), now).unwrap();
    assert!(start_attempt(&mut db, &uid, "seed-python-fizzbuzz", now).is_ok());
  }

  #[test]
  fn submit_without_start_is_rejected() {
    let (mut db, uid) = fresh_db();
    let err =
      submit_attempt(&mut db, &uid, "seed-math-basics", &full_marks_quiz(), Utc::now()).unwrap_err();
    assert!(matches!(err, ApiError::NoActiveAttempt));
  }

  #[test]
  fn submit_updates_every_ledger_under_one_guard() {
    let (mut db, uid) = fresh_db();
    let now = Utc::now();
    start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    let out = submit_attempt(&mut db, &uid, "seed-math-basics", &full_marks_quiz(), now).unwrap();

    assert_eq!(out.attempt.percentage, 100);
    assert!(out.attempt.passed);
    // Base 50 + perfect 25 + fast 10 + first 10.
    assert_eq!(out.xp_earned, 95);
    assert_eq!(out.streak, 1);
    // First Steps and Perfect Score both land in the same sweep.
    let mut badge_ids: Vec<&str> = out.new_badges.iter().map(|b| b.badge_id.as_str()).collect();
    badge_ids.sort();
    assert_eq!(badge_ids, vec!["badge-first-steps", "badge-perfect-score"]);

    let user = db.users.get(&uid).unwrap();
    // Attempt XP plus 50 + 150 badge bonuses.
    assert_eq!(user.gamification.total_xp, 295);
    assert_eq!(user.statistics.challenges_completed, 1);

    let ch = db.challenges.get("seed-math-basics").unwrap();
    assert_eq!(ch.statistics.total_attempts, 1);
    assert_eq!(ch.statistics.total_completions, 1);
    assert!((ch.statistics.average_score - 100.0).abs() < 1e-9);
  }

  #[test]
  fn second_submit_needs_a_new_start() {
    let (mut db, uid) = fresh_db();
    let now = Utc::now();
    start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    submit_attempt(&mut db, &uid, "seed-math-basics", &full_marks_quiz(), now).unwrap();
    let err =
      submit_attempt(&mut db, &uid, "seed-math-basics", &full_marks_quiz(), now).unwrap_err();
    assert!(matches!(err, ApiError::NoActiveAttempt));
  }

  #[test]
  fn stale_attempt_is_failed_and_replaced() {
    let (mut db, uid) = fresh_db();
    let t0 = Utc::now();
    let first = start_attempt(&mut db, &uid, "seed-math-basics", t0).unwrap();
    let later = t0 + Duration::hours(STALE_ATTEMPT_HOURS + 1);
    let second = start_attempt(&mut db, &uid, "seed-math-basics", later).unwrap();

    assert!(!second.resumed);
    assert_eq!(second.attempt.attempt_number, 2);
    assert_eq!(db.attempts.get(&first.attempt.id).unwrap().status, AttemptStatus::Failed);
  }

  #[test]
  fn abandon_is_terminal_and_leaves_challenge_statistics_alone() {
    let (mut db, uid) = fresh_db();
    let now = Utc::now();
    start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    submit_attempt(&mut db, &uid, "seed-math-basics", &full_marks_quiz(), now).unwrap();

    start_attempt(&mut db, &uid, "seed-math-basics", now).unwrap();
    let a = abandon_attempt(&mut db, &uid, "seed-math-basics", now + Duration::seconds(90)).unwrap();
    assert_eq!(a.status, AttemptStatus::Abandoned);
    assert_eq!(a.time_spent, 90);

    // The running averages never see the abandoned attempt.
    let ch = db.challenges.get("seed-math-basics").unwrap();
    assert_eq!(ch.statistics.total_attempts, 1);
    assert_eq!(ch.statistics.total_completions, 1);
    assert!((ch.statistics.average_score - 100.0).abs() < 1e-9);
  }
}
