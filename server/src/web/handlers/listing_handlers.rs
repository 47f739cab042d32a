// haven/server/src/web/handlers/listing_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{event, info, instrument, warn, Level};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::gating;
use crate::models::{Listing, ListingImage, ListingSearch, ListingStatus, Package, PublicProfile, User};
use crate::pipelines::common_steps::{generate_listing_slug, load_owned_listing, required, validate_listing_draft};
use crate::pipelines::contexts::{CreateListingCtx, ListingDraft};
use crate::seo;
use crate::state::AppState;
use crate::web::handlers::{nullable, run_flow};
use crate::web::{AuthenticatedUser, MaybeUser};
use haven_flow::FlowCtx;

#[instrument(name = "handler::search_listings", skip(app_state, query))]
pub async fn search_listings_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListingSearch>,
) -> AppResult<HttpResponse> {
  let filter = query.into_inner();
  if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
    if min > max {
      return Err(AppError::Validation("min_price must not exceed max_price.".to_string()));
    }
  }
  let (per_page, offset) = filter.paging();
  let listings = Listing::search(&app_state.db_pool, &filter).await?;
  event!(Level::DEBUG, results = listings.len(), "Listing search served.");

  Ok(HttpResponse::Ok().json(json!({
    "listings": listings,
    "page": offset / per_page + 1,
    "perPage": per_page,
  })))
}

#[instrument(name = "handler::listing_quota", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn quota_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> AppResult<HttpResponse> {
  let pool = &app_state.db_pool;
  let user = User::find_by_id(pool, auth.user_id)
    .await?
    .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;
  let package = Package::for_user(pool, user.package_id).await?;
  let used = Listing::count_for_quota(pool, user.id).await?;
  let quota = gating::quota(user.role, package.as_ref(), user.subscription_status, used);

  Ok(HttpResponse::Ok().json(json!({
    "used": quota.used,
    "limit": quota.limit,
    "remaining": quota.remaining(),
    "canCreate": quota.can_create(),
    "package": package.map(|p| p.name),
  })))
}

#[instrument(name = "handler::create_listing", skip(app_state, payload), fields(user_id = %auth.user_id))]
pub async fn create_listing_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  payload: web::Json<ListingDraft>,
) -> AppResult<HttpResponse> {
  let ctx = FlowCtx::new(CreateListingCtx {
    app_state: app_state.get_ref().clone(),
    owner_id: auth.user_id,
    draft: payload.into_inner(),
    validated: None,
    owner: None,
    package: None,
    quota: None,
    slug: None,
    meta_description: None,
    listing: None,
  });

  let ctx = run_flow(&app_state, ctx).await?;
  let (listing, quota) = ctx.with(|c| (required(&c.listing, "listing"), c.quota));
  let listing = listing?;

  Ok(HttpResponse::Created().json(json!({
    "listing": listing,
    "quota": quota.map(|q| json!({ "used": q.used + 1, "limit": q.limit })),
  })))
}

/// Listing page data: images, agent card and the SEO block.
#[instrument(name = "handler::listing_detail", skip(app_state, viewer))]
pub async fn listing_detail_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  viewer: MaybeUser,
) -> AppResult<HttpResponse> {
  let slug = path.into_inner();
  let pool = &app_state.db_pool;
  let not_found = || AppError::NotFound("Listing not found.".to_string());

  let listing = Listing::find_by_slug(pool, &slug).await?.ok_or_else(not_found)?;
  let is_owner = viewer.0.is_some_and(|v| v.user_id == listing.owner_id);
  if !listing.status.is_public() && !is_owner {
    return Err(not_found());
  }

  let images = ListingImage::list_for_listing(pool, listing.id).await?;
  let agent = User::find_by_id(pool, listing.owner_id).await?.map(|u| PublicProfile::from(&u));
  if !is_owner {
    if let Err(e) = Listing::record_view(pool, listing.id).await {
      warn!(error = %e, listing_id = %listing.id, "View count not recorded.");
    }
  }

  let base_url = &app_state.config.app_base_url;
  let seo_block = json!({
    "title": format!("{} | Haven", listing.title),
    "metaDescription": listing.meta_description,
    "canonicalUrl": seo::canonical_url(base_url, &listing.slug),
    "jsonLd": seo::structured_data(&listing, &images, base_url),
  });

  Ok(HttpResponse::Ok().json(json!({
    "listing": listing,
    "images": images,
    "agent": agent,
    "seo": seo_block,
  })))
}

/// Partial update; absent fields keep their stored value and `null` clears an optional one.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateListingPayload {
  pub title: Option<String>,
  pub description: Option<String>,
  pub property_type: Option<String>,
  pub listing_type: Option<String>,
  pub price_cents: Option<i64>,
  #[serde(default, deserialize_with = "nullable")]
  pub bedrooms: Option<Option<i32>>,
  #[serde(default, deserialize_with = "nullable")]
  pub bathrooms: Option<Option<f32>>,
  #[serde(default, deserialize_with = "nullable")]
  pub square_feet: Option<Option<i32>>,
  #[serde(default, deserialize_with = "nullable")]
  pub year_built: Option<Option<i32>>,
  pub address_line: Option<String>,
  pub city: Option<String>,
  pub state: Option<String>,
  #[serde(default, deserialize_with = "nullable")]
  pub postal_code: Option<Option<String>>,
  #[serde(default, deserialize_with = "nullable")]
  pub latitude: Option<Option<f64>>,
  #[serde(default, deserialize_with = "nullable")]
  pub longitude: Option<Option<f64>>,
  pub features: Option<Vec<String>>,
  pub status: Option<ListingStatus>,
}

/// Stored listing overlaid with the patch, as a draft for re-validation.
pub fn merge_update(existing: &Listing, patch: UpdateListingPayload) -> ListingDraft {
  ListingDraft {
    title: patch.title.unwrap_or_else(|| existing.title.clone()),
    description: patch.description.unwrap_or_else(|| existing.description.clone()),
    property_type: patch.property_type.unwrap_or_else(|| existing.property_type.as_str().to_string()),
    listing_type: patch.listing_type.unwrap_or_else(|| existing.listing_type.as_str().to_string()),
    price_cents: patch.price_cents.unwrap_or(existing.price_cents),
    bedrooms: patch.bedrooms.unwrap_or(existing.bedrooms),
    bathrooms: patch.bathrooms.unwrap_or(existing.bathrooms),
    square_feet: patch.square_feet.unwrap_or(existing.square_feet),
    year_built: patch.year_built.unwrap_or(existing.year_built),
    address_line: patch.address_line.unwrap_or_else(|| existing.address_line.clone()),
    city: patch.city.unwrap_or_else(|| existing.city.clone()),
    state: patch.state.unwrap_or_else(|| existing.state.clone()),
    postal_code: patch.postal_code.unwrap_or_else(|| existing.postal_code.clone()),
    latitude: patch.latitude.unwrap_or(existing.latitude),
    longitude: patch.longitude.unwrap_or(existing.longitude),
    features: patch.features.unwrap_or_else(|| existing.features.clone()),
    // Status moves are checked separately; creation rules do not apply here.
    status: None,
  }
}

fn slug_inputs_changed(existing: &Listing, draft: &ListingDraft) -> bool {
  existing.title != draft.title || existing.city != draft.city || existing.state != draft.state
}

#[instrument(name = "handler::update_listing", skip(app_state, payload), fields(user_id = %auth.user_id))]
pub async fn update_listing_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateListingPayload>,
) -> AppResult<HttpResponse> {
  let pool = &app_state.db_pool;
  let existing = load_owned_listing(pool, path.into_inner(), auth.user_id).await?;
  let payload = payload.into_inner();
  let new_status = payload.status.unwrap_or(existing.status);

  let valid = validate_listing_draft(&merge_update(&existing, payload))?;

  // Bringing an archived listing back consumes a slot again.
  if new_status.counts_toward_quota() && !existing.status.counts_toward_quota() {
    let owner = User::find_by_id(pool, auth.user_id)
      .await?
      .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;
    let package = Package::for_user(pool, owner.package_id).await?;
    let used = Listing::count_for_quota(pool, owner.id).await?;
    gating::check_listing_quota(owner.role, package.as_ref(), owner.subscription_status, used)?;
  }

  let slug = if slug_inputs_changed(&existing, &valid.draft) {
    generate_listing_slug(pool, &valid.draft.title, &valid.draft.city, &valid.draft.state, Some(existing.id)).await?
  } else {
    existing.slug.clone()
  };

  let d = valid.draft;
  let mut updated = Listing {
    title: d.title,
    slug,
    description: d.description,
    property_type: valid.property_type,
    listing_type: valid.listing_type,
    status: new_status,
    price_cents: d.price_cents,
    bedrooms: d.bedrooms,
    bathrooms: d.bathrooms,
    square_feet: d.square_feet,
    year_built: d.year_built,
    address_line: d.address_line.trim().to_string(),
    city: d.city,
    state: d.state,
    postal_code: d.postal_code,
    latitude: d.latitude,
    longitude: d.longitude,
    features: d.features,
    ..existing.clone()
  };
  updated.meta_description = seo::meta_description(&updated);

  let saved = sqlx::query_as::<_, Listing>(
    "UPDATE listings SET
       title = $2, slug = $3, description = $4, property_type = $5, listing_type = $6, status = $7,
       price_cents = $8, bedrooms = $9, bathrooms = $10, square_feet = $11, year_built = $12,
       address_line = $13, city = $14, state = $15, postal_code = $16, latitude = $17, longitude = $18,
       features = $19, meta_description = $20, updated_at = NOW()
     WHERE id = $1
     RETURNING *",
  )
  .bind(updated.id)
  .bind(&updated.title)
  .bind(&updated.slug)
  .bind(&updated.description)
  .bind(updated.property_type)
  .bind(updated.listing_type)
  .bind(updated.status)
  .bind(updated.price_cents)
  .bind(updated.bedrooms)
  .bind(updated.bathrooms)
  .bind(updated.square_feet)
  .bind(updated.year_built)
  .bind(&updated.address_line)
  .bind(&updated.city)
  .bind(&updated.state)
  .bind(&updated.postal_code)
  .bind(updated.latitude)
  .bind(updated.longitude)
  .bind(&updated.features)
  .bind(&updated.meta_description)
  .fetch_one(pool)
  .await?;

  if saved.slug != existing.slug {
    info!(listing_id = %saved.id, old_slug = %existing.slug, new_slug = %saved.slug, "Listing slug regenerated.");
  }
  Ok(HttpResponse::Ok().json(json!({ "listing": saved })))
}

#[instrument(name = "handler::delete_listing", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn delete_listing_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
  let pool = &app_state.db_pool;
  let listing = load_owned_listing(pool, path.into_inner(), auth.user_id).await?;
  let images = ListingImage::list_for_listing(pool, listing.id).await?;

  sqlx::query("DELETE FROM listings WHERE id = $1")
    .bind(listing.id)
    .execute(pool)
    .await?;

  // Rows are gone; stray objects are only logged.
  for image in &images {
    for key in [&image.storage_key, &image.thumbnail_key] {
      if let Err(e) = app_state.store.delete(key).await {
        warn!(error = %e, %key, "Stored image not removed.");
      }
    }
  }
  info!(listing_id = %listing.id, images = images.len(), "Listing deleted.");
  Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seo::test_listing;

  #[test]
  fn merge_keeps_unpatched_fields() {
    let existing = test_listing();
    let draft = merge_update(
      &existing,
      UpdateListingPayload { price_cents: Some(39_900_000), ..Default::default() },
    );
    assert_eq!(draft.price_cents, 39_900_000);
    assert_eq!(draft.title, existing.title);
    assert_eq!(draft.property_type, "house");
    assert_eq!(draft.listing_type, "sale");
    assert!(!slug_inputs_changed(&existing, &draft));
  }

  #[test]
  fn location_change_requires_new_slug() {
    let existing = test_listing();
    let draft = merge_update(&existing, UpdateListingPayload { city: Some("Dallas".to_string()), ..Default::default() });
    assert!(slug_inputs_changed(&existing, &draft));
  }

  #[test]
  fn explicit_null_clears_optional_fields() {
    let mut existing = test_listing();
    existing.bedrooms = Some(3);
    existing.square_feet = Some(1200);
    existing.postal_code = Some("78701".to_string());

    let patch: UpdateListingPayload =
      serde_json::from_value(json!({ "bedrooms": null, "postal_code": null, "title": "Renamed" })).unwrap();
    let draft = merge_update(&existing, patch);
    assert_eq!(draft.bedrooms, None);
    assert_eq!(draft.postal_code, None);
    assert_eq!(draft.square_feet, Some(1200));
    assert_eq!(draft.title, "Renamed");
  }
}
