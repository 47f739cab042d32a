// haven/server/src/models/package.rs

use super::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A subscription tier. Purchasable only by users of `role`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Package {
  pub id: Uuid,
  pub name: String,
  pub role: Role,
  pub price_cents: i64,
  pub currency: String,
  pub billing_interval: String,
  pub listings_max: i32,
  pub featured_max: i32,
  pub features: Vec<String>,
  #[serde(skip_serializing)]
  pub stripe_price_id: Option<String>,
  pub is_active: bool,
  pub sort_order: i32,
  pub created_at: DateTime<Utc>,
}

impl Package {
  pub fn is_free(&self) -> bool {
    self.price_cents == 0
  }

  pub fn has_feature(&self, flag: &str) -> bool {
    self.features.iter().any(|f| f.eq_ignore_ascii_case(flag))
  }

  pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Package>, sqlx::Error> {
    sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE id = $1")
      .bind(id)
      .fetch_optional(pool)
      .await
  }

  pub async fn find_by_name(pool: &PgPool, role: Role, name: &str) -> Result<Option<Package>, sqlx::Error> {
    sqlx::query_as::<_, Package>("SELECT * FROM packages WHERE role = $1 AND lower(name) = lower($2)")
      .bind(role)
      .bind(name)
      .fetch_optional(pool)
      .await
  }

  pub async fn list_active(pool: &PgPool, role: Option<Role>) -> Result<Vec<Package>, sqlx::Error> {
    sqlx::query_as::<_, Package>(
      "SELECT * FROM packages WHERE is_active AND ($1::user_role IS NULL OR role = $1) ORDER BY role, sort_order, price_cents",
    )
    .bind(role)
    .fetch_all(pool)
    .await
  }

  /// Package currently attached to a user, if any.
  pub async fn for_user(pool: &PgPool, package_id: Option<Uuid>) -> Result<Option<Package>, sqlx::Error> {
    match package_id {
      Some(id) => Package::find_by_id(pool, id).await,
      None => Ok(None),
    }
  }
}
