// haven/server/src/models/favorite.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Favorite {
  pub user_id: Uuid,
  pub listing_id: Uuid,
  pub created_at: DateTime<Utc>,
}

impl Favorite {
  /// Adds the favourite when absent, removes it when present. Returns the new state.
  pub async fn toggle(pool: &PgPool, user_id: Uuid, listing_id: Uuid) -> Result<bool, sqlx::Error> {
    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND listing_id = $2")
      .bind(user_id)
      .bind(listing_id)
      .execute(pool)
      .await?
      .rows_affected();
    if removed > 0 {
      return Ok(false);
    }

    sqlx::query("INSERT INTO favorites (user_id, listing_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
      .bind(user_id)
      .bind(listing_id)
      .execute(pool)
      .await?;
    Ok(true)
  }
}
