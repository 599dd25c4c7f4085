//! Password hashing, signed bearer tokens, and the request extractors that
//! gate handlers (`AuthUser`, `AdminUser`, `OptionalUser`).
//!
//! Tokens are a base64url JSON payload plus a SHA-256 signature over the
//! payload and the server secret. Stateless: no revocation list; expiry and
//! the account's active flag are checked on every request.

use axum::{
  async_trait,
  extract::FromRequestParts,
  http::{header::AUTHORIZATION, request::Parts},
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::user::Role;
use crate::error::ApiError;
use crate::store::AppState;

/// Token lifetime.
const TOKEN_TTL_DAYS: i64 = 7;

fn hex(bytes: &[u8]) -> String {
  bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256_hex(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex(&hasher.finalize())
}

/// Hash a password with a fresh random salt. Stored as `salt$digest`.
pub fn hash_password(password: &str) -> String {
  let salt_bytes: [u8; 16] = rand::random();
  let salt = URL_SAFE_NO_PAD.encode(salt_bytes);
  let digest = sha256_hex(&format!("{salt}:{password}"));
  format!("{salt}${digest}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
  let Some((salt, digest)) = stored.split_once('$') else {
    return false;
  };
  sha256_hex(&format!("{salt}:{password}")) == digest
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String,
  /// Unix seconds.
  pub exp: i64,
}

fn sign(payload_b64: &str, secret: &str) -> String {
  sha256_hex(&format!("{payload_b64}.{secret}"))
}

pub fn issue_token(secret: &str, user_id: &str, now: DateTime<Utc>) -> String {
  let claims = Claims {
    sub: user_id.to_string(),
    exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
  };
  // Serializing a two-field struct cannot fail.
  let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
  let sig = sign(&payload, secret);
  format!("{payload}.{sig}")
}

pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<Claims, ApiError> {
  let Some((payload, sig)) = token.split_once('.') else {
    return Err(ApiError::Auth("Invalid token".into()));
  };
  if sign(payload, secret) != sig {
    return Err(ApiError::Auth("Invalid token".into()));
  }
  let bytes = URL_SAFE_NO_PAD
    .decode(payload)
    .map_err(|_| ApiError::Auth("Invalid token".into()))?;
  let claims: Claims =
    serde_json::from_slice(&bytes).map_err(|_| ApiError::Auth("Invalid token".into()))?;
  if claims.exp < now.timestamp() {
    return Err(ApiError::Auth("Token expired".into()));
  }
  Ok(claims)
}

fn bearer_token(parts: &Parts) -> Option<String> {
  parts
    .headers
    .get(AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(|s| s.to_string())
}

/// An authenticated, active account. Carries just enough for authorization;
/// handlers re-read the full document under their own guard.
#[derive(Clone, Debug)]
pub struct AuthUser {
  pub id: String,
  pub username: String,
  pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
    let token = bearer_token(parts).ok_or_else(|| ApiError::Auth("Missing bearer token".into()))?;
    let claims = verify_token(&state.token_secret, &token, Utc::now())?;

    let db = state.db.read().await;
    let user = db
      .users
      .get(&claims.sub)
      .ok_or_else(|| ApiError::Auth("Unknown account".into()))?;
    if !user.is_active {
      return Err(ApiError::Auth("Account deactivated".into()));
    }
    Ok(AuthUser { id: user.id.clone(), username: user.username.clone(), role: user.role })
  }
}

/// An authenticated admin. Wraps `AuthUser` and adds the role check.
#[derive(Clone, Debug)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    if user.role != Role::Admin {
      return Err(ApiError::Forbidden("Admin access required".into()));
    }
    Ok(AdminUser(user))
  }
}

/// Auth when present, anonymous otherwise. A present-but-invalid token is
/// still rejected rather than silently downgraded.
#[derive(Clone, Debug)]
pub struct OptionalUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
    if bearer_token(parts).is_none() {
      return Ok(OptionalUser(None));
    }
    Ok(OptionalUser(Some(AuthUser::from_request_parts(parts, state).await?)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_roundtrip() {
    let stored = hash_password("s3cret");
    assert!(verify_password("s3cret", &stored));
    assert!(!verify_password("wrong", &stored));
  }

  #[test]
  fn salts_are_unique_per_hash() {
    assert_ne!(hash_password("same"), hash_password("same"));
  }

  #[test]
  fn malformed_stored_hash_never_verifies() {
    assert!(!verify_password("x", "no-dollar-sign"));
  }

  #[test]
  fn token_roundtrip_and_expiry() {
    let now = Utc::now();
    let token = issue_token("secret", "u1", now);
    let claims = verify_token("secret", &token, now).unwrap();
    assert_eq!(claims.sub, "u1");

    let after_expiry = now + Duration::days(TOKEN_TTL_DAYS + 1);
    assert!(verify_token("secret", &token, after_expiry).is_err());
  }

  #[test]
  fn tampered_token_is_rejected() {
    let now = Utc::now();
    let token = issue_token("secret", "u1", now);
    let mut tampered = token.clone();
    tampered.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });
    assert!(verify_token("secret", &tampered, now).is_err());
    assert!(verify_token("other-secret", &token, now).is_err());
  }
}
