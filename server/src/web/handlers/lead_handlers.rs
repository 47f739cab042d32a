// haven/server/src/web/handlers/lead_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Lead, LeadStatus};
use crate::pipelines::common_steps::required;
use crate::pipelines::contexts::SubmitLeadCtx;
use crate::state::AppState;
use crate::web::handlers::run_flow;
use crate::web::{AuthenticatedUser, MaybeUser};
use haven_flow::FlowCtx;

#[derive(Debug, Deserialize)]
pub struct LeadPayload {
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LeadStatusPayload {
  pub status: LeadStatus,
}

#[instrument(name = "handler::submit_lead", skip(app_state, payload, viewer))]
pub async fn submit_lead_handler(
  app_state: web::Data<AppState>,
  viewer: MaybeUser,
  path: web::Path<Uuid>,
  payload: web::Json<LeadPayload>,
) -> AppResult<HttpResponse> {
  let payload = payload.into_inner();
  let ctx = FlowCtx::new(SubmitLeadCtx {
    app_state: app_state.get_ref().clone(),
    listing_id: path.into_inner(),
    sender_id: viewer.0.map(|v| v.user_id),
    name: payload.name,
    email: payload.email,
    phone: payload.phone,
    message: payload.message,
    listing: None,
    agent: None,
    lead: None,
    conversation_id: None,
    agent_notified: false,
  });

  let ctx = run_flow(&app_state, ctx).await?;
  let (lead, conversation_id) = ctx.with(|c| (required(&c.lead, "lead"), c.conversation_id));
  Ok(HttpResponse::Created().json(json!({
    "lead": lead?,
    "conversationId": conversation_id,
  })))
}

/// Agents move their own leads through new → contacted → closed.
#[instrument(name = "handler::update_lead_status", skip(app_state, payload), fields(user_id = %auth.user_id))]
pub async fn update_lead_status_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
  payload: web::Json<LeadStatusPayload>,
) -> AppResult<HttpResponse> {
  let lead_id = path.into_inner();
  let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
    .bind(lead_id)
    .fetch_optional(&app_state.db_pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Lead not found.".to_string()))?;
  if lead.agent_id != auth.user_id {
    return Err(AppError::Forbidden("This lead belongs to another agent.".to_string()));
  }

  let updated = sqlx::query_as::<_, Lead>("UPDATE leads SET status = $2 WHERE id = $1 RETURNING *")
    .bind(lead.id)
    .bind(payload.status)
    .fetch_one(&app_state.db_pool)
    .await?;
  info!(%lead_id, status = ?updated.status, "Lead status updated.");
  Ok(HttpResponse::Ok().json(json!({ "lead": updated })))
}
