// haven/server/src/web/handlers/billing_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::gating;
use crate::models::{Package, User};
use crate::pipelines::common_steps::required;
use crate::pipelines::contexts::CheckoutCtx;
use crate::state::AppState;
use crate::web::handlers::run_flow;
use crate::web::AuthenticatedUser;
use haven_flow::FlowCtx;

#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
  pub package_id: Uuid,
}

async fn start_checkout(state: &AppState, user_id: Uuid, package_id: Uuid, upgrade: bool) -> AppResult<HttpResponse> {
  let ctx = FlowCtx::new(CheckoutCtx {
    app_state: state.clone(),
    user_id,
    package_id,
    upgrade,
    user: None,
    current_package: None,
    target_package: None,
    session: None,
  });

  let ctx = run_flow(state, ctx).await?;
  let session = ctx.with(|c| required(&c.session, "checkout session"))?;
  Ok(HttpResponse::Ok().json(json!({
    "sessionId": session.id,
    "checkoutUrl": session.url,
  })))
}

#[instrument(name = "handler::checkout", skip(app_state, payload), fields(user_id = %auth.user_id, package_id = %payload.package_id))]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  payload: web::Json<CheckoutPayload>,
) -> AppResult<HttpResponse> {
  start_checkout(&app_state, auth.user_id, payload.package_id, false).await
}

#[instrument(name = "handler::upgrade", skip(app_state, payload), fields(user_id = %auth.user_id, package_id = %payload.package_id))]
pub async fn upgrade_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  payload: web::Json<CheckoutPayload>,
) -> AppResult<HttpResponse> {
  start_checkout(&app_state, auth.user_id, payload.package_id, true).await
}

#[instrument(name = "handler::subscription", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn subscription_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> AppResult<HttpResponse> {
  let user = User::find_by_id(&app_state.db_pool, auth.user_id)
    .await?
    .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;
  let package = Package::for_user(&app_state.db_pool, user.package_id).await?;

  Ok(HttpResponse::Ok().json(json!({
    "package": package,
    "status": user.subscription_status,
    "active": user.subscription_status.grants_access(),
    "listingLimit": gating::listing_limit(user.role, package.as_ref(), user.subscription_status),
    "features": gating::feature_access(user.role, package.as_ref(), user.subscription_status),
  })))
}
