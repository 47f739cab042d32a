// haven/server/src/pipelines/login.rs

use crate::errors::AppError;
use crate::models::User;
use crate::pipelines::common_steps::required;
use crate::pipelines::contexts::LoginCtx;
use crate::services::auth;
use haven_flow::{Control, Flow, FlowCtx, FlowRegistry};
use tracing::{event, info, warn, Level};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

fn invalid_credentials() -> AppError {
  AppError::Auth(INVALID_CREDENTIALS.to_string())
}

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<LoginCtx, AppError>::new(&[
    ("validate_input", false, None),
    ("fetch_user", false, None),
    ("verify_password", false, None),
    ("issue_session_token", false, None),
  ])
  .named("login");

  flow.on("validate_input", |ctx: FlowCtx<LoginCtx>| {
    Box::pin(async move {
      let (email, password_empty) = {
        let guard = ctx.read();
        (guard.email.trim().to_lowercase(), guard.password.is_empty())
      };
      if email.is_empty() || password_empty {
        return Err(AppError::Validation("Email and password are required.".to_string()));
      }
      ctx.write().email = email;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("fetch_user", |ctx: FlowCtx<LoginCtx>| {
    Box::pin(async move {
      let (email, pool) = {
        let guard = ctx.read();
        (guard.email.clone(), guard.app_state.db_pool.clone())
      };

      match User::find_by_email(&pool, &email).await? {
        Some(user) => {
          event!(Level::DEBUG, user_id = %user.id, "User found for login.");
          ctx.write().user = Some(user);
          Ok(Control::Continue)
        }
        None => {
          warn!(%email, "Login for unknown email.");
          Err(invalid_credentials())
        }
      }
    })
  });

  flow.on("verify_password", |ctx: FlowCtx<LoginCtx>| {
    Box::pin(async move {
      let (user, password) = {
        let guard = ctx.read();
        (required(&guard.user, "user")?, guard.password.clone())
      };

      let matches = auth::verify_password(&user.password_hash, &password)?;
      ctx.write().password.clear();
      if !matches {
        warn!(user_id = %user.id, "Login password mismatch.");
        return Err(invalid_credentials());
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("issue_session_token", |ctx: FlowCtx<LoginCtx>| {
    Box::pin(async move {
      let (user, tokens) = {
        let guard = ctx.read();
        (required(&guard.user, "user")?, guard.app_state.tokens.clone())
      };

      let token = tokens.issue(user.id, user.role)?;
      info!(user_id = %user.id, role = %user.role, "Session token issued.");
      ctx.write().session_token = Some(token);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(flow);
}
