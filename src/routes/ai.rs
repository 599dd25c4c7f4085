//! Tutor chat endpoints. Replies come from the model client when configured,
//! otherwise from a canned fallback so the feature degrades instead of
//! erroring.
//!
//! Streaming mode returns a chunked plain-text body. The upstream call keeps
//! running even if the client disconnects mid-stream, so the full reply is
//! still persisted into the session.

use axum::{
  body::{Body, Bytes},
  extract::{Path, State},
  http::header::CONTENT_TYPE,
  response::{IntoResponse, Response},
  Json,
};
use chrono::Utc;
use futures::{channel::mpsc, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{info, instrument, warn};

use crate::auth::AuthUser;
use crate::domain::chat::{ChatRole, ChatSession, ContextKind};
use crate::error::ApiError;
use crate::protocol::*;
use crate::store::AppState;

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id, kind = ?body.context_kind))]
pub async fn start_session(
  State(state): State<AppState>,
  user: AuthUser,
  Json(body): Json<ChatStartIn>,
) -> Result<Json<Value>, ApiError> {
  let mut db = state.db.write().await;

  if let Some(r) = &body.context_ref {
    match body.context_kind {
      ContextKind::ChallengeHelp if !db.challenges.contains_key(r) => {
        return Err(ApiError::NotFound("Challenge"));
      }
      ContextKind::LearningPath if !db.paths.contains_key(r) => {
        return Err(ApiError::NotFound("Learning path"));
      }
      _ => {}
    }
  }

  let now = Utc::now();
  let mut session = ChatSession::new(&user.id, body.context_kind, body.context_ref, now);
  session.add_message(ChatRole::Assistant, body.context_kind.welcome().to_string(), now);
  info!(target: "buddy_backend", session_id = %session.id, "Chat session started");
  let out = ok_msg("Session started", &session);
  db.sessions.insert(session.id.clone(), session);
  Ok(out)
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id, %session_id))]
pub async fn get_session(
  State(state): State<AppState>,
  Path(session_id): Path<String>,
  user: AuthUser,
) -> Result<Json<Value>, ApiError> {
  let db = state.db.read().await;
  let session = db.sessions.get(&session_id).ok_or(ApiError::NotFound("Session"))?;
  if session.user_id != user.id {
    return Err(ApiError::Forbidden("Not your session".into()));
  }
  Ok(ok(session))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id, %session_id, stream = body.stream))]
pub async fn send_message(
  State(state): State<AppState>,
  Path(session_id): Path<String>,
  user: AuthUser,
  Json(body): Json<ChatMessageIn>,
) -> Result<Response, ApiError> {
  if body.message.trim().is_empty() {
    return Err(ApiError::Validation("Message must not be empty".into()));
  }
  let now = Utc::now();

  // Record the user turn and build the model context under one guard.
  let context = {
    let mut db = state.db.write().await;
    let user_doc = db.users.get(&user.id).cloned().ok_or(ApiError::NotFound("User"))?;
    let session = db.sessions.get_mut(&session_id).ok_or(ApiError::NotFound("Session"))?;
    if session.user_id != user.id {
      return Err(ApiError::Forbidden("Not your session".into()));
    }
    session.add_message(ChatRole::User, body.message.clone(), now);
    session.conversation_context(&user_doc)
  };

  let Some(openai) = state.openai.clone() else {
    let reply = state.prompts.tutor_fallback.clone();
    persist_reply(&state, &session_id, reply.clone()).await;
    return Ok(ok(json!({ "reply": reply, "canned": true })).into_response());
  };

  if body.stream {
    let (tx, rx) = mpsc::unbounded::<String>();
    let stream_state = state.clone();
    let sid = session_id.clone();
    tokio::spawn(async move {
      match openai.chat_stream(&context, tx.clone()).await {
        Ok(full) => persist_reply(&stream_state, &sid, full).await,
        Err(e) => {
          // Upstream failures degrade to the canned reply, same as buffered.
          warn!(target: "buddy_backend", session_id = %sid, error = %e, "Streamed tutor reply failed; using canned reply");
          let fallback = stream_state.prompts.tutor_fallback.clone();
          let _ = tx.unbounded_send(fallback.clone());
          persist_reply(&stream_state, &sid, fallback).await;
        }
      }
    });

    let body = Body::from_stream(rx.map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk))));
    let response = Response::builder()
      .header(CONTENT_TYPE, "text/plain; charset=utf-8")
      .body(body)
      .map_err(|e| ApiError::Internal(e.to_string()))?;
    return Ok(response);
  }

  let (reply, canned) = match openai.chat_plain(&context).await {
    Ok(reply) => (reply, false),
    Err(e) => {
      warn!(target: "buddy_backend", %session_id, error = %e, "Tutor upstream failed; using canned reply");
      (state.prompts.tutor_fallback.clone(), true)
    }
  };
  persist_reply(&state, &session_id, reply.clone()).await;
  Ok(ok(json!({ "reply": reply, "canned": canned })).into_response())
}

async fn persist_reply(state: &AppState, session_id: &str, reply: String) {
  let mut db = state.db.write().await;
  if let Some(session) = db.sessions.get_mut(session_id) {
    session.add_message(ChatRole::Assistant, reply, Utc::now());
  }
}
