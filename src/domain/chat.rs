//! Tutor chat sessions: per-user conversations with a context kind that
//! shapes the system prompt sent to the text-generation backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::User;
use crate::util::fill_template;

/// How many trailing messages are replayed to the model per request.
const CONTEXT_WINDOW: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  System,
  User,
  Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
  pub role: ChatRole,
  pub content: String,
  pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
  #[default]
  General,
  ChallengeHelp,
  LearningPath,
  StudyPlanning,
  CareerAdvice,
}

impl ContextKind {
  /// Greeting posted as the first assistant message of a new session.
  pub fn welcome(self) -> &'static str {
    match self {
      ContextKind::General => "Hi! I'm your learning buddy. Ask me anything about what you're studying.",
      ContextKind::ChallengeHelp => "Stuck on a challenge? Tell me where you are and I'll nudge you in the right direction.",
      ContextKind::LearningPath => "Let's talk about your learning path. Which step are you on?",
      ContextKind::StudyPlanning => "Let's plan your studying. How much time do you have this week?",
      ContextKind::CareerAdvice => "Happy to talk careers. What are you working toward?",
    }
  }

  fn prompt_template(self) -> &'static str {
    match self {
      ContextKind::General => {
        "You are a friendly learning tutor for {username} (level {level}). \
         Answer questions clearly, encourage progress, and keep replies short."
      }
      ContextKind::ChallengeHelp => {
        "You are helping {username} (level {level}) work through a challenge. \
         Guide with hints and questions; never hand over the full solution."
      }
      ContextKind::LearningPath => {
        "You are advising {username} (level {level}) on their learning path. \
         Relate answers to their current step and what comes next."
      }
      ContextKind::StudyPlanning => {
        "You are a study planner for {username} (level {level}). Help them \
         build realistic schedules around a daily goal of {dailyGoal} minutes."
      }
      ContextKind::CareerAdvice => {
        "You are a career mentor for {username} (level {level}). Give \
         practical, experience-grounded advice tied to their learning record."
      }
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
  pub id: String,
  pub user_id: String,
  pub context_kind: ContextKind,
  /// Challenge or path id the session is anchored to, when applicable.
  #[serde(default)]
  pub context_ref: Option<String>,
  pub messages: Vec<ChatMessage>,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
  pub last_activity: DateTime<Utc>,
}

impl ChatSession {
  pub fn new(user_id: &str, context_kind: ContextKind, context_ref: Option<String>, now: DateTime<Utc>) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      user_id: user_id.to_string(),
      context_kind,
      context_ref,
      messages: Vec::new(),
      is_active: true,
      created_at: now,
      last_activity: now,
    }
  }

  pub fn add_message(&mut self, role: ChatRole, content: String, now: DateTime<Utc>) {
    self.messages.push(ChatMessage { role, content, timestamp: now });
    self.last_activity = now;
  }

  /// Build the message list for one model call: the context-specific system
  /// prompt followed by the trailing window of the conversation.
  pub fn conversation_context(&self, user: &User) -> Vec<(ChatRole, String)> {
    let level = user.gamification.level.to_string();
    let daily_goal = user.settings.daily_goal_minutes.to_string();
    let system = fill_template(
      self.context_kind.prompt_template(),
      &[("username", &user.username), ("level", &level), ("dailyGoal", &daily_goal)],
    );

    let mut out = vec![(ChatRole::System, system)];
    let start = self.messages.len().saturating_sub(CONTEXT_WINDOW);
    out.extend(self.messages[start..].iter().map(|m| (m.role, m.content.clone())));
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::user::Profile;

  fn user() -> User {
    User::new("ana".into(), "ana@example.com".into(), "digest".into(), Profile::default(), Utc::now())
  }

  #[test]
  fn context_starts_with_personalized_system_prompt() {
    let s = ChatSession::new("u1", ContextKind::General, None, Utc::now());
    let ctx = s.conversation_context(&user());
    assert_eq!(ctx.len(), 1);
    assert_eq!(ctx[0].0, ChatRole::System);
    assert!(ctx[0].1.contains("ana"));
    assert!(ctx[0].1.contains("level 1"));
  }

  #[test]
  fn context_window_keeps_only_trailing_messages() {
    let now = Utc::now();
    let mut s = ChatSession::new("u1", ContextKind::ChallengeHelp, Some("c1".into()), now);
    for i in 0..15 {
      s.add_message(ChatRole::User, format!("msg {i}"), now);
    }
    let ctx = s.conversation_context(&user());
    // System prompt plus the last 10 messages.
    assert_eq!(ctx.len(), 11);
    assert_eq!(ctx[1].1, "msg 5");
    assert_eq!(ctx[10].1, "msg 14");
  }

  #[test]
  fn study_planning_prompt_includes_daily_goal() {
    let s = ChatSession::new("u1", ContextKind::StudyPlanning, None, Utc::now());
    let ctx = s.conversation_context(&user());
    assert!(ctx[0].1.contains("30 minutes"));
  }

  #[test]
  fn add_message_advances_last_activity() {
    let now = Utc::now();
    let mut s = ChatSession::new("u1", ContextKind::General, None, now);
    let later = now + chrono::Duration::minutes(5);
    s.add_message(ChatRole::Assistant, "hi".into(), later);
    assert_eq!(s.last_activity, later);
  }
}
