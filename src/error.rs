//! Request-level error taxonomy. Every handler returns `Result<_, ApiError>`
//! and the error converts itself into the standard `{success:false, message}`
//! JSON envelope with a conventional status code.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  /// Malformed or missing input (400).
  #[error("{0}")]
  Validation(String),

  /// Invalid credentials, bad/expired token, deactivated account (401).
  #[error("{0}")]
  Auth(String),

  /// Authenticated but not allowed (403).
  #[error("{0}")]
  Forbidden(String),

  /// Missing user/challenge/path/session/badge (404).
  #[error("{0} not found")]
  NotFound(&'static str),

  /// Already enrolled, already has badge, username/email taken (409).
  #[error("{0}")]
  Conflict(String),

  /// Prerequisites not met; carries the missing challenge ids (400).
  #[error("Prerequisites not met")]
  PrerequisitesNotMet { missing: Vec<String> },

  /// Submitting without an in-progress attempt (400).
  #[error("No active attempt found")]
  NoActiveAttempt,

  /// Catch-all; message is not leaked to clients (500).
  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::PrerequisitesNotMet { .. } | ApiError::NoActiveAttempt => StatusCode::BAD_REQUEST,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();

    let body = match &self {
      ApiError::PrerequisitesNotMet { missing } => json!({
        "success": false,
        "message": self.to_string(),
        "missingPrerequisites": missing,
      }),
      ApiError::Internal(detail) => {
        tracing::error!(target: "buddy_backend", %detail, "internal error");
        json!({ "success": false, "message": "Internal server error" })
      }
      _ => json!({ "success": false, "message": self.to_string() }),
    };

    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_follow_taxonomy() {
    assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ApiError::NotFound("Challenge").status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
    assert_eq!(ApiError::NoActiveAttempt.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn not_found_message_names_the_entity() {
    assert_eq!(ApiError::NotFound("Challenge").to_string(), "Challenge not found");
  }
}
