// haven/server/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
  User,
  Agent,
  Expert,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::User => "USER",
      Role::Agent => "AGENT",
      Role::Expert => "EXPERT",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "USER" => Ok(Role::User),
      "AGENT" => Ok(Role::Agent),
      "EXPERT" => Ok(Role::Expert),
      other => Err(format!("Unknown role '{}'. Expected USER, AGENT or EXPERT.", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
  Inactive,
  Active,
  PastDue,
  Canceled,
}

impl SubscriptionStatus {
  /// Paid package features stay available while a renewal is being retried.
  pub fn grants_access(&self) -> bool {
    matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
  pub id: Uuid,
  pub email: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub name: String,
  pub phone: Option<String>,
  pub role: Role,
  pub email_verified: bool,
  pub package_id: Option<Uuid>,
  pub subscription_status: SubscriptionStatus,
  #[serde(skip_serializing)]
  pub stripe_customer_id: Option<String>,
  #[serde(skip_serializing)]
  pub stripe_subscription_id: Option<String>,
  pub bio: Option<String>,
  pub company: Option<String>,
  pub license_number: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// What other visitors may see about an agent or expert.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
  pub id: Uuid,
  pub name: String,
  pub role: Role,
  pub bio: Option<String>,
  pub company: Option<String>,
  pub license_number: Option<String>,
  pub member_since: DateTime<Utc>,
}

impl From<&User> for PublicProfile {
  fn from(u: &User) -> Self {
    Self {
      id: u.id,
      name: u.name.clone(),
      role: u.role,
      bio: u.bio.clone(),
      company: u.company.clone(),
      license_number: u.license_number.clone(),
      member_since: u.created_at,
    }
  }
}

impl User {
  pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
      .bind(id)
      .fetch_optional(pool)
      .await
  }

  pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
      .bind(email.trim().to_lowercase())
      .fetch_optional(pool)
      .await
  }

  pub async fn find_by_stripe_subscription(pool: &PgPool, subscription_id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE stripe_subscription_id = $1")
      .bind(subscription_id)
      .fetch_optional(pool)
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn role_parses_case_insensitively() {
    assert_eq!("agent".parse::<Role>(), Ok(Role::Agent));
    assert_eq!(" Expert ".parse::<Role>(), Ok(Role::Expert));
    assert!("broker".parse::<Role>().is_err());
  }

  #[test]
  fn role_serializes_uppercase() {
    assert_eq!(serde_json::to_string(&Role::Expert).unwrap(), "\"EXPERT\"");
  }

  #[test]
  fn past_due_keeps_access() {
    assert!(SubscriptionStatus::PastDue.grants_access());
    assert!(!SubscriptionStatus::Canceled.grants_access());
    assert!(!SubscriptionStatus::Inactive.grants_access());
  }
}
