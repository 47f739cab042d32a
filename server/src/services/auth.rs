// haven/server/src/services/auth.rs

//! Password hashing and signed session tokens.

use crate::errors::AppError;
use crate::models::Role;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rand_core::RngCore;
use sha2::Sha256;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const INVALID_TOKEN: &str = "Invalid or expired session token.";

/// Hashes a plain-text password with Argon2 and a fresh random salt.
#[instrument(name = "auth::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty.".to_string()));
  }

  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      AppError::Internal(format!("Password hashing failed: {}", e))
    })
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash itself is unusable.
#[instrument(name = "auth::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, provided_password: &str) -> Result<bool, AppError> {
  if provided_password.is_empty() {
    return Ok(false);
  }

  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Stored password hash could not be parsed.");
    AppError::Internal(format!("Invalid stored password hash: {}", e))
  })?;

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password mismatch.");
      Ok(false)
    }
    Err(e) => {
      error!(error = %e, "Argon2 verification failed.");
      Err(AppError::Internal(format!("Password verification failed: {}", e)))
    }
  }
}

/// Random single-use token for email verification links.
pub fn generate_verification_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
  pub user_id: Uuid,
  pub role: Role,
  pub expires_at: DateTime<Utc>,
}

/// Issues and checks `v1.{user_id}.{role}.{exp}.{sig}` bearer tokens.
#[derive(Clone)]
pub struct SessionTokens {
  secret: Vec<u8>,
  ttl: Duration,
}

impl std::fmt::Debug for SessionTokens {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SessionTokens").field("ttl", &self.ttl).finish_non_exhaustive()
  }
}

impl SessionTokens {
  pub fn new(secret: &str, ttl_hours: i64) -> Self {
    Self {
      secret: secret.as_bytes().to_vec(),
      ttl: Duration::hours(ttl_hours),
    }
  }

  fn mac(&self) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(&self.secret).map_err(|e| AppError::Internal(format!("Invalid session key: {}", e)))
  }

  pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AppError> {
    self.issue_at(user_id, role, Utc::now())
  }

  pub fn issue_at(&self, user_id: Uuid, role: Role, now: DateTime<Utc>) -> Result<String, AppError> {
    let exp = (now + self.ttl).timestamp();
    let payload = format!("{}.{}.{}.{}", TOKEN_VERSION, user_id, role.as_str(), exp);
    let mut mac = self.mac()?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", payload, signature))
  }

  pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
    self.verify_at(token, Utc::now())
  }

  pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AppError> {
    let invalid = || AppError::Auth(INVALID_TOKEN.to_string());

    let (payload, signature) = token.trim().rsplit_once('.').ok_or_else(invalid)?;
    let parts: Vec<&str> = payload.split('.').collect();
    if parts.len() != 4 || parts[0] != TOKEN_VERSION {
      return Err(invalid());
    }

    let signature = hex::decode(signature).map_err(|_| invalid())?;
    let mut mac = self.mac()?;
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
      warn!("Session token signature mismatch.");
      return Err(invalid());
    }

    let user_id = Uuid::parse_str(parts[1]).map_err(|_| invalid())?;
    let role = parts[2].parse::<Role>().map_err(|_| invalid())?;
    let exp = parts[3].parse::<i64>().map_err(|_| invalid())?;
    let expires_at = Utc.timestamp_opt(exp, 0).single().ok_or_else(invalid)?;
    if expires_at <= now {
      debug!(%user_id, "Session token expired.");
      return Err(invalid());
    }

    Ok(SessionClaims { user_id, role, expires_at })
  }
}
