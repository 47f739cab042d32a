// haven/server/src/pipelines/common_steps.rs

//! Checks and lookups shared by several workflows and handlers.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Listing, ListingStatus, ListingType, PropertyType};
use crate::pipelines::contexts::{ListingDraft, ValidListing};
use crate::seo;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::PgPool;
use tracing::{instrument, warn};
use uuid::Uuid;

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 150;
pub const DESCRIPTION_MAX_CHARS: usize = 10_000;
pub const MAX_FEATURES: usize = 40;

static EMAIL_PATTERN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Lowercased, trimmed address, or a validation error.
pub fn normalize_email(raw: &str) -> AppResult<String> {
  let email = raw.trim().to_lowercase();
  if email.len() > 254 || !EMAIL_PATTERN.is_match(&email) {
    return Err(AppError::Validation("A valid email address is required.".to_string()));
  }
  Ok(email)
}

/// A value an earlier step should have put into the context.
pub fn required<T: Clone>(value: &Option<T>, what: &str) -> AppResult<T> {
  value
    .clone()
    .ok_or_else(|| AppError::Internal(format!("{} missing from workflow context", what)))
}

pub fn validate_listing_draft(draft: &ListingDraft) -> AppResult<ValidListing> {
  let title_len = draft.title.trim().chars().count();
  if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
    return Err(AppError::Validation(format!(
      "Title must be between {} and {} characters.",
      TITLE_MIN_CHARS, TITLE_MAX_CHARS
    )));
  }
  if draft.description.chars().count() > DESCRIPTION_MAX_CHARS {
    return Err(AppError::Validation(format!(
      "Description must be at most {} characters.",
      DESCRIPTION_MAX_CHARS
    )));
  }
  if draft.price_cents <= 0 {
    return Err(AppError::Validation("Price must be greater than zero.".to_string()));
  }
  if draft.city.trim().is_empty() || draft.state.trim().is_empty() {
    return Err(AppError::Validation("City and state are required.".to_string()));
  }
  let property_type = draft.property_type.parse::<PropertyType>().map_err(AppError::Validation)?;
  let listing_type = draft.listing_type.parse::<ListingType>().map_err(AppError::Validation)?;

  if draft.bedrooms.is_some_and(|b| !(0..=100).contains(&b)) {
    return Err(AppError::Validation("Bedrooms must be between 0 and 100.".to_string()));
  }
  if draft.bathrooms.is_some_and(|b| !(0.0..=100.0).contains(&b)) {
    return Err(AppError::Validation("Bathrooms must be between 0 and 100.".to_string()));
  }
  if draft.square_feet.is_some_and(|s| s <= 0) {
    return Err(AppError::Validation("Square footage must be positive.".to_string()));
  }
  if draft.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat))
    || draft.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng))
  {
    return Err(AppError::Validation("Coordinates are out of range.".to_string()));
  }
  if draft.features.len() > MAX_FEATURES {
    return Err(AppError::Validation(format!("At most {} features may be listed.", MAX_FEATURES)));
  }

  let status = match draft.status.unwrap_or(ListingStatus::Active) {
    s @ (ListingStatus::Draft | ListingStatus::Active) => s,
    _ => return Err(AppError::Validation("New listings must be 'draft' or 'active'.".to_string())),
  };

  let mut cleaned = draft.clone();
  cleaned.title = draft.title.trim().to_string();
  cleaned.city = draft.city.trim().to_string();
  cleaned.state = draft.state.trim().to_string();
  cleaned.features = draft
    .features
    .iter()
    .map(|f| f.trim().to_string())
    .filter(|f| !f.is_empty())
    .collect();

  Ok(ValidListing { draft: cleaned, property_type, listing_type, status })
}

/// Slug from title and location that no other listing uses.
#[instrument(name = "common_step::listing_slug", skip(pool))]
pub async fn generate_listing_slug(
  pool: &PgPool,
  title: &str,
  city: &str,
  state: &str,
  except: Option<Uuid>,
) -> AppResult<String> {
  let base = seo::listing_slug_base(title, city, state);
  seo::unique_slug(&base, |candidate| {
    let pool = pool.clone();
    async move { Listing::slug_taken(&pool, &candidate, except).await.map_err(AppError::from) }
  })
  .await
}

/// The listing, provided `user_id` owns it.
pub async fn load_owned_listing(pool: &PgPool, listing_id: Uuid, user_id: Uuid) -> AppResult<Listing> {
  let listing = Listing::find_by_id(pool, listing_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Listing not found.".to_string()))?;
  if listing.owner_id != user_id {
    warn!(%listing_id, %user_id, "Listing access denied: not the owner.");
    return Err(AppError::Forbidden("You do not own this listing.".to_string()));
  }
  Ok(listing)
}
