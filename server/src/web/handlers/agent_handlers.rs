// haven/server/src/web/handlers/agent_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::gating;
use crate::models::{Listing, PublicProfile, User};
use crate::state::AppState;

/// Public profile of an agent or expert with their active listings.
#[instrument(name = "handler::agent_profile", skip(app_state))]
pub async fn agent_profile_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
  let agent_id = path.into_inner();
  let user = User::find_by_id(&app_state.db_pool, agent_id)
    .await?
    .filter(|u| gating::can_create_listings(u.role))
    .ok_or_else(|| AppError::NotFound("Agent not found.".to_string()))?;
  let listings = Listing::list_by_owner(&app_state.db_pool, user.id, true).await?;

  Ok(HttpResponse::Ok().json(json!({
    "profile": PublicProfile::from(&user),
    "listings": listings,
  })))
}
