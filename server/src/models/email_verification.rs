// haven/server/src/models/email_verification.rs

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct EmailVerification {
  pub id: Uuid,
  pub user_id: Uuid,
  pub token: String,
  pub expires_at: DateTime<Utc>,
  pub used_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

impl EmailVerification {
  pub const TTL_HOURS: i64 = 48;

  pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
    self.used_at.is_none() && self.expires_at > now
  }
}
