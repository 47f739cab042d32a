// haven/server/src/web/handlers/favorite_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Favorite, Listing};
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[instrument(name = "handler::toggle_favorite", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn toggle_favorite_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
  let listing_id = path.into_inner();
  if Listing::find_by_id(&app_state.db_pool, listing_id).await?.is_none() {
    return Err(AppError::NotFound("Listing not found.".to_string()));
  }
  let favorited = Favorite::toggle(&app_state.db_pool, auth.user_id, listing_id).await?;
  event!(Level::DEBUG, %listing_id, favorited, "Favorite toggled.");
  Ok(HttpResponse::Ok().json(json!({ "favorited": favorited })))
}
