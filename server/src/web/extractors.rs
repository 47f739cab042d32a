// haven/server/src/web/extractors.rs

use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::{event, Level};
use uuid::Uuid;

/// Caller identified by a valid `Authorization: Bearer` session token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub role: Role,
}

/// Optional variant: anonymous requests pass, bad tokens still fail.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

fn bearer_token(req: &HttpRequest) -> Option<&str> {
  req
    .headers()
    .get(AUTHORIZATION)
    .and_then(|h| h.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

fn authenticate(req: &HttpRequest, token: &str) -> Result<AuthenticatedUser, AppError> {
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("Application state is not configured.".to_string()))?;
  let claims = state.tokens.verify(token)?;
  Ok(AuthenticatedUser { user_id: claims.user_id, role: claims.role })
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = match bearer_token(req) {
      Some(token) => authenticate(req, token),
      None => {
        event!(Level::DEBUG, path = %req.path(), "Request without bearer token.");
        Err(AppError::Auth("Authentication required.".to_string()))
      }
    };
    ready(result)
  }
}

impl FromRequest for MaybeUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(match bearer_token(req) {
      Some(token) => authenticate(req, token).map(|user| MaybeUser(Some(user))),
      None => Ok(MaybeUser(None)),
    })
  }
}

impl AuthenticatedUser {
  pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&self.role) {
      Ok(())
    } else {
      Err(AppError::Forbidden(format!("This action is not available to {} accounts.", self.role)))
    }
  }
}
