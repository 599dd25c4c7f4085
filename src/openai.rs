//! Minimal OpenAI client for the tutor and feedback features.
//!
//! We only call chat.completions, either buffered or streamed (SSE). Calls are
//! instrumented and log model names, latencies, and response sizes, never
//! contents or the API key.

use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::chat::ChatRole;
use crate::util::fill_template;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  fn request_for(&self, messages: &[(ChatRole, String)], stream: bool) -> ChatCompletionRequest {
    ChatCompletionRequest {
      model: self.model.clone(),
      messages: messages
        .iter()
        .map(|(role, content)| ChatMessageReq {
          role: match role {
            ChatRole::System => "system".into(),
            ChatRole::User => "user".into(),
            ChatRole::Assistant => "assistant".into(),
          },
          content: content.clone(),
        })
        .collect(),
      temperature: 0.7,
      stream,
    }
  }

  /// Buffered chat completion. Used for tutor replies and attempt feedback.
  #[instrument(level = "info", skip(self, messages), fields(model = %self.model, n_messages = messages.len()))]
  pub async fn chat_plain(&self, messages: &[(ChatRole, String)]) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let start = std::time::Instant::now();

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "buddy-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&self.request_for(messages, false))
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();
    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "Model response received");

    Ok(text)
  }

  /// Streamed chat completion. Each content delta is forwarded on `tx`; the
  /// accumulated full reply is returned so the caller can persist it even if
  /// the receiving side went away mid-stream.
  #[instrument(level = "info", skip(self, messages, tx), fields(model = %self.model, n_messages = messages.len()))]
  pub async fn chat_stream(
    &self,
    messages: &[(ChatRole, String)],
    tx: UnboundedSender<String>,
  ) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "buddy-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&self.request_for(messages, true))
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let mut full = String::new();
    let mut buf = String::new();
    let mut stream = res.bytes_stream();

    while let Some(chunk) = stream.next().await {
      let chunk = chunk.map_err(|e| e.to_string())?;
      buf.push_str(&String::from_utf8_lossy(&chunk));

      // SSE events are newline-delimited "data: {...}" lines.
      while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim().to_string();
        buf.drain(..=pos);
        let Some(data) = line.strip_prefix("data: ") else { continue };
        if data == "[DONE]" {
          return Ok(full);
        }
        if let Ok(delta) = serde_json::from_str::<StreamChunk>(data) {
          if let Some(text) = delta.choices.first().and_then(|c| c.delta.content.clone()) {
            full.push_str(&text);
            // A closed receiver means the client disconnected; keep draining
            // the stream so the full reply can still be persisted.
            let _ = tx.unbounded_send(text);
          }
        }
      }
    }

    Ok(full)
  }

  /// Short personalized feedback on a finished attempt.
  #[instrument(level = "info", skip(self, prompts, title), fields(title_len = title.len()))]
  pub async fn attempt_feedback(
    &self,
    prompts: &Prompts,
    title: &str,
    score: u32,
    max_score: u32,
    percentage: u8,
    passed: bool,
  ) -> Result<String, String> {
    let user = fill_template(
      &prompts.feedback_user_template,
      &[
        ("title", title),
        ("score", &score.to_string()),
        ("maxScore", &max_score.to_string()),
        ("percentage", &percentage.to_string()),
        ("passed", if passed { "yes" } else { "no" }),
      ],
    );
    let result = self
      .chat_plain(&[(ChatRole::System, prompts.feedback_system.clone()), (ChatRole::User, user)])
      .await;
    if let Err(e) = &result {
      error!(error = %e, "Model call failed during feedback generation");
    }
    result
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  stream: bool,
}
#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct StreamChunk {
  choices: Vec<StreamChoice>,
}
#[derive(Deserialize)]
struct StreamChoice {
  delta: StreamDelta,
}
#[derive(Deserialize)]
struct StreamDelta {
  #[serde(default)]
  content: Option<String>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
