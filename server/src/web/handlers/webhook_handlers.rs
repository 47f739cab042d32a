// haven/server/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{error, info, instrument};

use crate::errors::Result as AppResult;
use crate::pipelines::contexts::StripeWebhookCtx;
use crate::pipelines::stripe_webhook;
use crate::state::AppState;
use haven_flow::FlowCtx;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Stripe delivery endpoint. Failures after the event was recorded release it
/// so the provider's retry is processed again.
#[instrument(name = "handler::stripe_webhook", skip_all, fields(bytes = body.len()))]
pub async fn stripe_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> AppResult<HttpResponse> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|h| h.to_str().ok())
    .map(str::to_string);

  let ctx = FlowCtx::new(StripeWebhookCtx {
    app_state: app_state.get_ref().clone(),
    payload: body,
    signature,
    event: None,
    recorded: false,
    duplicate: false,
  });

  if let Err(err) = app_state.flows.run(ctx.clone()).await {
    let recorded_id = ctx.with(|c| c.event.as_ref().filter(|_| c.recorded).map(|e| e.id.clone()));
    if let Some(event_id) = recorded_id {
      if let Err(release_err) = stripe_webhook::release_event(&app_state.db_pool, &event_id).await {
        error!(error = %release_err, %event_id, "Failed to release webhook event after error.");
      }
    }
    return Err(err);
  }

  let (event_type, duplicate) = ctx.with(|c| (c.event_type().to_string(), c.duplicate));
  info!(%event_type, duplicate, "Stripe webhook acknowledged.");
  Ok(HttpResponse::Ok().json(json!({ "received": true, "duplicate": duplicate })))
}
