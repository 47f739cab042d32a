// haven/server/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::{AppError, Result as AppResult};
use crate::gating;
use crate::models::{Listing, Package, Role, User};
use crate::pipelines::contexts::{LoginCtx, RegisterCtx, VerifyEmailCtx};
use crate::pipelines::common_steps::required;
use crate::state::AppState;
use crate::web::handlers::run_flow;
use crate::web::AuthenticatedUser;
use haven_flow::FlowCtx;

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
  pub email: String,
  pub password: String,
  pub name: String,
  pub phone: Option<String>,
  pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailPayload {
  pub token: String,
}

#[instrument(name = "handler::register", skip(app_state, payload), fields(email = %payload.email))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<RegisterPayload>,
) -> AppResult<HttpResponse> {
  let payload = payload.into_inner();
  let ctx = FlowCtx::new(RegisterCtx {
    app_state: app_state.get_ref().clone(),
    email: payload.email,
    password: payload.password,
    name: payload.name,
    phone: payload.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
    requested_role: payload.role,
    role: Role::User,
    created_user: None,
    verification_token: None,
    verification_sent: false,
  });

  let ctx = run_flow(&app_state, ctx).await?;
  let (user, verification_sent) = ctx.with(|c| (required(&c.created_user, "created user"), c.verification_sent));
  let user = user?;
  info!(user_id = %user.id, role = %user.role, "Account registered.");

  Ok(HttpResponse::Created().json(json!({
    "user": user,
    "verificationEmailSent": verification_sent,
  })))
}

#[instrument(name = "handler::login", skip(app_state, payload), fields(email = %payload.email))]
pub async fn login_handler(app_state: web::Data<AppState>, payload: web::Json<LoginPayload>) -> AppResult<HttpResponse> {
  let payload = payload.into_inner();
  let ctx = FlowCtx::new(LoginCtx {
    app_state: app_state.get_ref().clone(),
    email: payload.email,
    password: payload.password,
    user: None,
    session_token: None,
  });

  let ctx = run_flow(&app_state, ctx).await?;
  let (user, token) = ctx.with(|c| (required(&c.user, "user"), required(&c.session_token, "session token")));
  let (user, token) = (user?, token?);

  Ok(HttpResponse::Ok().json(json!({
    "token": token,
    "tokenType": "Bearer",
    "expiresInHours": app_state.config.session_ttl_hours,
    "user": user,
  })))
}

#[instrument(name = "handler::verify_email", skip_all)]
pub async fn verify_email_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<VerifyEmailPayload>,
) -> AppResult<HttpResponse> {
  let ctx = FlowCtx::new(VerifyEmailCtx {
    app_state: app_state.get_ref().clone(),
    token: payload.into_inner().token,
    user_id: None,
  });
  run_flow(&app_state, ctx).await?;
  Ok(HttpResponse::Ok().json(json!({ "verified": true })))
}

/// The signed-in account with its package, quota and feature flags.
#[instrument(name = "handler::me", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn me_handler(app_state: web::Data<AppState>, auth: AuthenticatedUser) -> AppResult<HttpResponse> {
  let pool = &app_state.db_pool;
  let user = User::find_by_id(pool, auth.user_id)
    .await?
    .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;
  let package = Package::for_user(pool, user.package_id).await?;
  let used = Listing::count_for_quota(pool, user.id).await?;
  let quota = gating::quota(user.role, package.as_ref(), user.subscription_status, used);
  let features = gating::feature_access(user.role, package.as_ref(), user.subscription_status);

  Ok(HttpResponse::Ok().json(json!({
    "user": user,
    "package": package,
    "quota": {
      "used": quota.used,
      "limit": quota.limit,
      "canCreate": quota.can_create(),
    },
    "features": features,
  })))
}
