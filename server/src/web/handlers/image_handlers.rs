// haven/server/src/web/handlers/image_handlers.rs

use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::ListingImage;
use crate::pipelines::common_steps::{load_owned_listing, required};
use crate::pipelines::contexts::UploadImageCtx;
use crate::state::AppState;
use crate::web::handlers::run_flow;
use crate::web::AuthenticatedUser;
use haven_flow::FlowCtx;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
  pub alt: Option<String>,
}

/// Collects the request body, failing as soon as it passes `max` bytes.
async fn read_body(mut payload: web::Payload, max: usize) -> AppResult<web::Bytes> {
  let mut body = web::BytesMut::new();
  while let Some(chunk) = payload.next().await {
    let chunk = chunk.map_err(|e| AppError::Validation(format!("Upload interrupted: {}", e)))?;
    if body.len() + chunk.len() > max {
      return Err(AppError::PayloadTooLarge(format!("Images may be at most {} bytes.", max)));
    }
    body.extend_from_slice(&chunk);
  }
  Ok(body.freeze())
}

#[instrument(name = "handler::upload_image", skip(app_state, payload, query), fields(user_id = %auth.user_id))]
pub async fn upload_image_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
  query: web::Query<UploadQuery>,
  payload: web::Payload,
) -> AppResult<HttpResponse> {
  let listing_id = path.into_inner();
  // Non-owners are turned away before any of the body is buffered.
  let listing = load_owned_listing(&app_state.db_pool, listing_id, auth.user_id).await?;
  let bytes = read_body(payload, app_state.config.max_upload_bytes).await?;
  let ctx = FlowCtx::new(UploadImageCtx {
    app_state: app_state.get_ref().clone(),
    user_id: auth.user_id,
    listing_id,
    bytes,
    alt_override: query.into_inner().alt,
    listing: Some(listing),
    processed: None,
    image_id: Uuid::new_v4(),
    storage_key: None,
    thumbnail_key: None,
    image: None,
  });

  let ctx = run_flow(&app_state, ctx).await?;
  let image = ctx.with(|c| required(&c.image, "image"))?;
  Ok(HttpResponse::Created().json(json!({ "image": image })))
}

#[instrument(name = "handler::delete_image", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn delete_image_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
  let (listing_id, image_id) = path.into_inner();
  let pool = &app_state.db_pool;
  let listing = load_owned_listing(pool, listing_id, auth.user_id).await?;

  let image = sqlx::query_as::<_, ListingImage>("DELETE FROM listing_images WHERE id = $1 AND listing_id = $2 RETURNING *")
    .bind(image_id)
    .bind(listing.id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Image not found.".to_string()))?;

  if image.is_primary {
    ListingImage::ensure_primary(pool, listing.id).await?;
  }
  for key in [&image.storage_key, &image.thumbnail_key] {
    if let Err(e) = app_state.store.delete(key).await {
      warn!(error = %e, %key, "Stored image not removed.");
    }
  }

  info!(%image_id, listing_id = %listing.id, "Listing image removed.");
  Ok(HttpResponse::NoContent().finish())
}
