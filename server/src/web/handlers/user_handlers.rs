// haven/server/src/web/handlers/user_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Lead, Listing, User};
use crate::state::AppState;
use crate::web::AuthenticatedUser;

const PROFILE_FIELD_MAX_CHARS: usize = 100;
const BIO_MAX_CHARS: usize = 2000;

/// Absent fields stay unchanged; empty strings clear optional ones.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfilePayload {
  pub name: Option<String>,
  pub phone: Option<String>,
  pub bio: Option<String>,
  pub company: Option<String>,
  pub license_number: Option<String>,
}

fn clean_optional(value: Option<String>, field: &str, max: usize) -> AppResult<Option<Option<String>>> {
  match value {
    None => Ok(None),
    Some(v) => {
      let v = v.trim().to_string();
      if v.chars().count() > max {
        return Err(AppError::Validation(format!("{} must be at most {} characters.", field, max)));
      }
      Ok(Some(if v.is_empty() { None } else { Some(v) }))
    }
  }
}

#[instrument(name = "handler::update_profile", skip(app_state, payload), fields(user_id = %auth.user_id))]
pub async fn update_profile_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  payload: web::Json<UpdateProfilePayload>,
) -> AppResult<HttpResponse> {
  let payload = payload.into_inner();

  let name = match payload.name {
    Some(n) => {
      let n = n.trim().to_string();
      if n.is_empty() || n.chars().count() > PROFILE_FIELD_MAX_CHARS {
        return Err(AppError::Validation("Name must not be empty.".to_string()));
      }
      Some(n)
    }
    None => None,
  };
  let phone = clean_optional(payload.phone, "Phone", 30)?;
  let bio = clean_optional(payload.bio, "Bio", BIO_MAX_CHARS)?;
  let company = clean_optional(payload.company, "Company", PROFILE_FIELD_MAX_CHARS)?;
  let license = clean_optional(payload.license_number, "License number", PROFILE_FIELD_MAX_CHARS)?;

  // `$n::bool` flags tell a cleared field apart from an untouched one.
  let user = sqlx::query_as::<_, User>(
    "UPDATE users SET
       name = COALESCE($2, name),
       phone = CASE WHEN $3 THEN $4 ELSE phone END,
       bio = CASE WHEN $5 THEN $6 ELSE bio END,
       company = CASE WHEN $7 THEN $8 ELSE company END,
       license_number = CASE WHEN $9 THEN $10 ELSE license_number END,
       updated_at = NOW()
     WHERE id = $1
     RETURNING *",
  )
  .bind(auth.user_id)
  .bind(name)
  .bind(phone.is_some())
  .bind(phone.flatten())
  .bind(bio.is_some())
  .bind(bio.flatten())
  .bind(company.is_some())
  .bind(company.flatten())
  .bind(license.is_some())
  .bind(license.flatten())
  .fetch_optional(&app_state.db_pool)
  .await?
  .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;

  info!("Profile updated.");
  Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

#[instrument(name = "handler::my_listings", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn my_listings_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> AppResult<HttpResponse> {
  let listings = Listing::list_by_owner(&app_state.db_pool, auth.user_id, false).await?;
  Ok(HttpResponse::Ok().json(json!({ "listings": listings })))
}

#[instrument(name = "handler::my_favorites", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn my_favorites_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> AppResult<HttpResponse> {
  let listings = Listing::favorites_of(&app_state.db_pool, auth.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "listings": listings })))
}

#[instrument(name = "handler::my_leads", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn my_leads_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> AppResult<HttpResponse> {
  let leads = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE agent_id = $1 ORDER BY created_at DESC")
    .bind(auth.user_id)
    .fetch_all(&app_state.db_pool)
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "leads": leads })))
}
