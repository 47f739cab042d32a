// haven/server/src/models/listing_image.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ListingImage {
  pub id: Uuid,
  pub listing_id: Uuid,
  #[serde(skip_serializing)]
  pub storage_key: String,
  pub url: String,
  #[serde(skip_serializing)]
  pub thumbnail_key: String,
  pub thumbnail_url: String,
  pub alt_text: String,
  pub width: i32,
  pub height: i32,
  pub position: i32,
  pub is_primary: bool,
  pub created_at: DateTime<Utc>,
}

impl ListingImage {
  pub async fn list_for_listing(pool: &PgPool, listing_id: Uuid) -> Result<Vec<ListingImage>, sqlx::Error> {
    sqlx::query_as::<_, ListingImage>("SELECT * FROM listing_images WHERE listing_id = $1 ORDER BY position, created_at")
      .bind(listing_id)
      .fetch_all(pool)
      .await
  }

  /// Callers serialize on the listing row before reading this.
  pub async fn next_position<'e>(executor: impl PgExecutor<'e>, listing_id: Uuid) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT COALESCE(MAX(position) + 1, 0) FROM listing_images WHERE listing_id = $1")
      .bind(listing_id)
      .fetch_one(executor)
      .await
  }

  /// Promotes the lowest-positioned remaining image when the listing has no primary.
  pub async fn ensure_primary(pool: &PgPool, listing_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
      "UPDATE listing_images SET is_primary = TRUE
       WHERE id = (SELECT id FROM listing_images WHERE listing_id = $1 ORDER BY position, created_at LIMIT 1)
         AND NOT EXISTS (SELECT 1 FROM listing_images WHERE listing_id = $1 AND is_primary)",
    )
    .bind(listing_id)
    .execute(pool)
    .await?;
    Ok(())
  }
}
