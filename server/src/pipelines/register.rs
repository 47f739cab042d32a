// haven/server/src/pipelines/register.rs

use crate::errors::AppError;
use crate::models::{EmailVerification, Role, User};
use crate::pipelines::common_steps::{normalize_email, required};
use crate::pipelines::contexts::RegisterCtx;
use crate::services::auth;
use chrono::{Duration, Utc};
use haven_flow::{Control, Flow, FlowCtx, FlowRegistry};
use tracing::{event, info, warn, Level};
use uuid::Uuid;

pub const PASSWORD_MIN_CHARS: usize = 8;
pub const NAME_MAX_CHARS: usize = 100;

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<RegisterCtx, AppError>::new(&[
    ("validate_input", false, None),
    ("check_existing_user", false, None),
    ("create_user", false, None),
    ("send_verification_email", true, None),
  ])
  .named("register");

  flow.on("validate_input", |ctx: FlowCtx<RegisterCtx>| {
    Box::pin(async move {
      let (raw_email, password_len, name, requested_role) = {
        let guard = ctx.read();
        (guard.email.clone(), guard.password.chars().count(), guard.name.trim().to_string(), guard.requested_role.clone())
      };

      let email = normalize_email(&raw_email)?;
      if password_len < PASSWORD_MIN_CHARS {
        warn!(password_len, "Registration rejected: password too short.");
        return Err(AppError::Validation(format!(
          "Password must be at least {} characters long.",
          PASSWORD_MIN_CHARS
        )));
      }
      if name.is_empty() || name.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::Validation(format!("Name is required (at most {} characters).", NAME_MAX_CHARS)));
      }
      let role = match requested_role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => r.parse::<Role>().map_err(AppError::Validation)?,
        None => Role::User,
      };

      {
        let mut guard = ctx.write();
        guard.email = email;
        guard.name = name;
        guard.role = role;
      }
      event!(Level::DEBUG, %role, "Registration input validated.");
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("check_existing_user", |ctx: FlowCtx<RegisterCtx>| {
    Box::pin(async move {
      let (email, pool) = {
        let guard = ctx.read();
        (guard.email.clone(), guard.app_state.db_pool.clone())
      };

      let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&pool)
        .await?;
      if exists {
        warn!(%email, "Registration rejected: email already in use.");
        return Err(AppError::Conflict("An account with this email already exists.".to_string()));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("create_user", |ctx: FlowCtx<RegisterCtx>| {
    Box::pin(async move {
      let (email, password, name, phone, role, pool) = {
        let guard = ctx.read();
        (
          guard.email.clone(),
          guard.password.clone(),
          guard.name.clone(),
          guard.phone.clone(),
          guard.role,
          guard.app_state.db_pool.clone(),
        )
      };

      let password_hash = auth::hash_password(&password)?;
      let token = auth::generate_verification_token();

      // The account and its verification token land together or not at all.
      let mut tx = pool.begin().await?;
      let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, password_hash, name, phone, role) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
      )
      .bind(Uuid::new_v4())
      .bind(&email)
      .bind(password_hash)
      .bind(&name)
      .bind(phone.filter(|p| !p.trim().is_empty()))
      .bind(role)
      .fetch_one(&mut *tx)
      .await?;
      sqlx::query("INSERT INTO email_verifications (id, user_id, token, expires_at) VALUES ($1, $2, $3, $4)")
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(&token)
        .bind(Utc::now() + Duration::hours(EmailVerification::TTL_HOURS))
        .execute(&mut *tx)
        .await?;
      tx.commit().await?;

      info!(user_id = %user.id, %role, "User registered.");
      {
        let mut guard = ctx.write();
        guard.password.clear();
        guard.created_user = Some(user);
        guard.verification_token = Some(token);
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("send_verification_email", |ctx: FlowCtx<RegisterCtx>| {
    Box::pin(async move {
      let (user, token, mailer) = {
        let guard = ctx.read();
        (
          required(&guard.created_user, "created user")?,
          required(&guard.verification_token, "verification token")?,
          guard.app_state.mailer.clone(),
        )
      };

      let sent = mailer.send_verification(&user.email, &user.name, &token).await?;
      info!(user_id = %user.id, message_id = %sent.message_id, "Verification email sent.");
      ctx.write().verification_sent = true;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(flow);
}
