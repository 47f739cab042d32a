// haven/server/src/pipelines/verify_email.rs

use crate::errors::AppError;
use crate::models::EmailVerification;
use crate::pipelines::common_steps::required;
use crate::pipelines::contexts::VerifyEmailCtx;
use chrono::Utc;
use haven_flow::{Control, Flow, FlowCtx, FlowRegistry};
use tracing::{info, warn};

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<VerifyEmailCtx, AppError>::new(&[("consume_token", false, None), ("mark_verified", false, None)])
    .named("verify_email");

  flow.on("consume_token", |ctx: FlowCtx<VerifyEmailCtx>| {
    Box::pin(async move {
      let (token, pool) = {
        let guard = ctx.read();
        (guard.token.trim().to_string(), guard.app_state.db_pool.clone())
      };
      if token.is_empty() {
        return Err(AppError::Validation("Verification token is required.".to_string()));
      }

      let verification =
        sqlx::query_as::<_, EmailVerification>("SELECT * FROM email_verifications WHERE token = $1")
          .bind(&token)
          .fetch_optional(&pool)
          .await?
          .ok_or_else(|| AppError::NotFound("Verification link is invalid.".to_string()))?;

      if !verification.is_usable(Utc::now()) {
        warn!(user_id = %verification.user_id, "Verification token used or expired.");
        return Err(AppError::Validation("Verification link has expired or was already used.".to_string()));
      }

      // Conditional update so two concurrent clicks cannot both succeed.
      let claimed = sqlx::query("UPDATE email_verifications SET used_at = NOW() WHERE id = $1 AND used_at IS NULL")
        .bind(verification.id)
        .execute(&pool)
        .await?
        .rows_affected();
      if claimed == 0 {
        return Err(AppError::Validation("Verification link has expired or was already used.".to_string()));
      }

      ctx.write().user_id = Some(verification.user_id);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("mark_verified", |ctx: FlowCtx<VerifyEmailCtx>| {
    Box::pin(async move {
      let (user_id, pool) = {
        let guard = ctx.read();
        (required(&guard.user_id, "user id")?, guard.app_state.db_pool.clone())
      };

      sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await?;
      info!(%user_id, "Email address verified.");
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(flow);
}
