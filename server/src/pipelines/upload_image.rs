// haven/server/src/pipelines/upload_image.rs

use crate::errors::AppError;
use crate::models::{Listing, ListingImage};
use crate::pipelines::common_steps::{load_owned_listing, required};
use crate::pipelines::contexts::UploadImageCtx;
use crate::seo;
use haven_flow::{Control, Flow, FlowCtx, FlowRegistry, SkipIf};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, event, info, warn, Level};
use uuid::Uuid;

pub const ALT_TEXT_MAX_CHARS: usize = 250;

pub fn image_keys(listing_id: Uuid, stem: &str) -> (String, String) {
  (
    format!("listings/{}/{}.jpg", listing_id, stem),
    format!("listings/{}/{}-thumb.jpg", listing_id, stem),
  )
}

struct NewImageRow<'a> {
  id: Uuid,
  storage_key: &'a str,
  url: String,
  thumbnail_key: &'a str,
  thumbnail_url: String,
  alt_override: Option<String>,
  width: i32,
  height: i32,
}

/// Assigns the next position and the primary flag while holding the listing row lock.
async fn insert_image_row(pool: &PgPool, listing: &Listing, row: NewImageRow<'_>) -> Result<ListingImage, sqlx::Error> {
  let mut tx = pool.begin().await?;
  sqlx::query("SELECT id FROM listings WHERE id = $1 FOR UPDATE")
    .bind(listing.id)
    .execute(&mut *tx)
    .await?;
  let position = ListingImage::next_position(&mut *tx, listing.id).await?;

  let alt_text = row
    .alt_override
    .map(|a| a.trim().to_string())
    .filter(|a| !a.is_empty())
    .unwrap_or_else(|| seo::image_alt_text(listing, position));

  let image = sqlx::query_as::<_, ListingImage>(
    "INSERT INTO listing_images
       (id, listing_id, storage_key, url, thumbnail_key, thumbnail_url, alt_text, width, height, position, is_primary)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
       NOT EXISTS (SELECT 1 FROM listing_images WHERE listing_id = $2 AND is_primary))
     RETURNING *",
  )
  .bind(row.id)
  .bind(listing.id)
  .bind(row.storage_key)
  .bind(&row.url)
  .bind(row.thumbnail_key)
  .bind(&row.thumbnail_url)
  .bind(&alt_text)
  .bind(row.width)
  .bind(row.height)
  .bind(position)
  .fetch_one(&mut *tx)
  .await?;

  tx.commit().await?;
  Ok(image)
}

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  let preloaded: SkipIf<UploadImageCtx> = Arc::new(|ctx: FlowCtx<UploadImageCtx>| ctx.with(|c| c.listing.is_some()));

  let mut flow = Flow::<UploadImageCtx, AppError>::new(&[
    ("check_ownership", false, Some(preloaded)),
    ("check_size", false, None),
    ("process_image", false, None),
    ("store_objects", false, None),
    ("persist_image", false, None),
  ])
  .named("upload_image");

  flow.on("check_ownership", |ctx: FlowCtx<UploadImageCtx>| {
    Box::pin(async move {
      let (listing_id, user_id, pool) = {
        let guard = ctx.read();
        (guard.listing_id, guard.user_id, guard.app_state.db_pool.clone())
      };
      let listing = load_owned_listing(&pool, listing_id, user_id).await?;
      ctx.write().listing = Some(listing);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("check_size", |ctx: FlowCtx<UploadImageCtx>| {
    Box::pin(async move {
      let (size, max, alt_len) = {
        let guard = ctx.read();
        (
          guard.bytes.len(),
          guard.app_state.config.max_upload_bytes,
          guard.alt_override.as_ref().map(|a| a.chars().count()).unwrap_or(0),
        )
      };
      if size == 0 {
        return Err(AppError::Validation("Upload body is empty.".to_string()));
      }
      if size > max {
        warn!(size, max, "Image upload too large.");
        return Err(AppError::PayloadTooLarge(format!("Images may be at most {} bytes.", max)));
      }
      if alt_len > ALT_TEXT_MAX_CHARS {
        return Err(AppError::Validation(format!("Alt text must be at most {} characters.", ALT_TEXT_MAX_CHARS)));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("process_image", |ctx: FlowCtx<UploadImageCtx>| {
    Box::pin(async move {
      let (bytes, processor) = {
        let guard = ctx.read();
        (guard.bytes.clone(), guard.app_state.images.clone())
      };

      // Decoding and resizing are CPU-bound.
      let processed = tokio::task::spawn_blocking(move || processor.process(&bytes))
        .await
        .map_err(|e| AppError::Internal(format!("Image worker failed: {}", e)))??;
      event!(
        Level::DEBUG,
        width = processed.large.width,
        height = processed.large.height,
        "Upload decoded and resized."
      );
      ctx.write().processed = Some(processed);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("store_objects", |ctx: FlowCtx<UploadImageCtx>| {
    Box::pin(async move {
      let (listing, processed, image_id, store) = {
        let guard = ctx.read();
        (
          required(&guard.listing, "listing")?,
          required(&guard.processed, "processed image")?,
          guard.image_id,
          guard.app_state.store.clone(),
        )
      };

      let stem = seo::image_file_stem(&listing.slug, image_id);
      let (large_key, thumb_key) = image_keys(listing.id, &stem);

      store.put(&large_key, &processed.large.bytes, "image/jpeg").await?;
      if let Err(e) = store.put(&thumb_key, &processed.thumb.bytes, "image/jpeg").await {
        let _ = store.delete(&large_key).await;
        return Err(e);
      }

      let mut guard = ctx.write();
      guard.storage_key = Some(large_key);
      guard.thumbnail_key = Some(thumb_key);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("persist_image", |ctx: FlowCtx<UploadImageCtx>| {
    Box::pin(async move {
      let (listing, processed, image_id, large_key, thumb_key, alt_override, pool, store) = {
        let guard = ctx.read();
        (
          required(&guard.listing, "listing")?,
          required(&guard.processed, "processed image")?,
          guard.image_id,
          required(&guard.storage_key, "storage key")?,
          required(&guard.thumbnail_key, "thumbnail key")?,
          guard.alt_override.clone(),
          guard.app_state.db_pool.clone(),
          guard.app_state.store.clone(),
        )
      };

      let inserted = insert_image_row(
        &pool,
        &listing,
        NewImageRow {
          id: image_id,
          url: store.public_url(&large_key),
          thumbnail_url: store.public_url(&thumb_key),
          storage_key: &large_key,
          thumbnail_key: &thumb_key,
          alt_override,
          width: processed.large.width as i32,
          height: processed.large.height as i32,
        },
      )
      .await;

      let image = match inserted {
        Ok(image) => image,
        Err(e) => {
          error!(error = %e, listing_id = %listing.id, "Image row insert failed; removing stored objects.");
          let _ = store.delete(&large_key).await;
          let _ = store.delete(&thumb_key).await;
          return Err(AppError::from(e));
        }
      };

      info!(image_id = %image.id, listing_id = %listing.id, primary = image.is_primary, "Listing image stored.");
      ctx.write().image = Some(image);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(flow);
}
