// haven/server/src/pipelines/stripe_webhook.rs

//! Stripe webhook handling: verify, de-duplicate, then route by event type to a sub-flow.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Package, SubscriptionStatus, User};
use crate::pipelines::common_steps::required;
use crate::pipelines::contexts::{CheckoutCompletedCtx, StripeWebhookCtx, SubscriptionEventCtx};
use crate::services::billing::{self, StripeEvent, SIGNATURE_TOLERANCE_SECS};
use chrono::Utc;
use haven_flow::{Control, Flow, FlowCtx, FlowError, FlowRegistry};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{event, info, warn, Level};
use uuid::Uuid;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const PAYMENT_FAILED: &str = "invoice.payment_failed";

const DISPATCH_STEP: &str = "dispatch_event";

/// Fields of a completed checkout session that identify the purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutCompletion {
  pub user_id: Option<Uuid>,
  pub package_id: Option<Uuid>,
  pub customer_id: Option<String>,
  pub subscription_id: Option<String>,
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
  path
    .iter()
    .try_fold(value, |v, key| v.get(*key))
    .and_then(Value::as_str)
    .map(str::to_string)
    .filter(|s| !s.is_empty())
}

fn uuid_at(value: &Value, path: &[&str]) -> Option<Uuid> {
  string_at(value, path).and_then(|s| Uuid::parse_str(&s).ok())
}

impl CheckoutCompletion {
  pub fn from_session(session: &Value) -> Self {
    Self {
      user_id: uuid_at(session, &["client_reference_id"]).or_else(|| uuid_at(session, &["metadata", "user_id"])),
      package_id: uuid_at(session, &["metadata", "package_id"]),
      customer_id: string_at(session, &["customer"]),
      subscription_id: string_at(session, &["subscription"]),
    }
  }
}

/// Subscription id for `customer.subscription.*` (the object itself) and `invoice.*` events.
pub fn subscription_id_of(event_type: &str, object: &Value) -> Option<String> {
  if event_type.starts_with("customer.subscription.") {
    string_at(object, &["id"])
  } else {
    string_at(object, &["subscription"])
  }
}

/// Forgets a recorded event so Stripe's retry is processed again.
pub async fn release_event(pool: &PgPool, event_id: &str) -> AppResult<()> {
  sqlx::query("DELETE FROM stripe_events WHERE id = $1")
    .bind(event_id)
    .execute(pool)
    .await?;
  Ok(())
}

fn is_event(ctx: &FlowCtx<StripeWebhookCtx>, event_type: &str) -> bool {
  ctx.with(|c| c.event_type() == event_type)
}

fn event_object(ctx: &FlowCtx<StripeWebhookCtx>) -> Result<(crate::state::AppState, String, Value), FlowError> {
  ctx.with(|c| match &c.event {
    Some(e) => Ok((c.app_state.clone(), e.event_type.clone(), e.data.object.clone())),
    None => Err(FlowError::extract(DISPATCH_STEP, "event not parsed")),
  })
}

fn checkout_completed_flow() -> Flow<CheckoutCompletedCtx, AppError> {
  let mut flow = Flow::<CheckoutCompletedCtx, AppError>::new(&[
    ("load_records", false, None),
    ("cancel_previous_subscription", true, None),
    ("apply_subscription", false, None),
    ("notify_subscriber", true, None),
  ])
  .named("checkout_completed");

  flow.on("load_records", |ctx: FlowCtx<CheckoutCompletedCtx>| {
    Box::pin(async move {
      let (user_id, package_id, pool) = {
        let guard = ctx.read();
        (guard.user_id, guard.package_id, guard.app_state.db_pool.clone())
      };
      let (Some(user_id), Some(package_id)) = (user_id, package_id) else {
        warn!("Checkout session without user or package reference; ignoring.");
        return Ok(Control::Halt);
      };

      let user = User::find_by_id(&pool, user_id).await?;
      let package = Package::find_by_id(&pool, package_id).await?;
      let (Some(user), Some(package)) = (user, package) else {
        warn!(%user_id, %package_id, "Checkout references unknown user or package; ignoring.");
        return Ok(Control::Halt);
      };
      if package.role != user.role {
        warn!(%user_id, package = %package.name, "Purchased package does not match the user's role.");
      }

      let mut guard = ctx.write();
      guard.user = Some(user);
      guard.package = Some(package);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("cancel_previous_subscription", |ctx: FlowCtx<CheckoutCompletedCtx>| {
    Box::pin(async move {
      let (user, new_subscription, billing) = {
        let guard = ctx.read();
        (required(&guard.user, "user")?, guard.subscription_id.clone(), guard.app_state.billing.clone())
      };
      match user.stripe_subscription_id {
        Some(previous) if Some(&previous) != new_subscription.as_ref() => {
          billing.cancel_subscription(&previous).await?;
          info!(user_id = %user.id, %previous, "Previous subscription canceled after upgrade.");
        }
        _ => {}
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("apply_subscription", |ctx: FlowCtx<CheckoutCompletedCtx>| {
    Box::pin(async move {
      let (user, package, customer_id, subscription_id, pool) = {
        let guard = ctx.read();
        (
          required(&guard.user, "user")?,
          required(&guard.package, "package")?,
          guard.customer_id.clone(),
          guard.subscription_id.clone(),
          guard.app_state.db_pool.clone(),
        )
      };

      sqlx::query(
        "UPDATE users SET package_id = $2, subscription_status = $3,
           stripe_customer_id = COALESCE($4, stripe_customer_id),
           stripe_subscription_id = $5, updated_at = NOW()
         WHERE id = $1",
      )
      .bind(user.id)
      .bind(package.id)
      .bind(SubscriptionStatus::Active)
      .bind(customer_id)
      .bind(subscription_id)
      .execute(&pool)
      .await?;
      info!(user_id = %user.id, package = %package.name, "Subscription activated.");
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("notify_subscriber", |ctx: FlowCtx<CheckoutCompletedCtx>| {
    Box::pin(async move {
      let (user, package, mailer) = {
        let guard = ctx.read();
        (required(&guard.user, "user")?, required(&guard.package, "package")?, guard.app_state.mailer.clone())
      };
      mailer.send_subscription_activated(&user.email, &user.name, &package.name).await?;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow
}

fn subscription_status_flow(name: &str, status: SubscriptionStatus) -> Flow<SubscriptionEventCtx, AppError> {
  let mut flow = Flow::<SubscriptionEventCtx, AppError>::new(&[("update_status", false, None)]).named(name);

  flow.on("update_status", move |ctx: FlowCtx<SubscriptionEventCtx>| {
    Box::pin(async move {
      let (event_type, subscription_id, pool) = {
        let guard = ctx.read();
        (guard.event_type.clone(), guard.subscription_id.clone(), guard.app_state.db_pool.clone())
      };
      let Some(subscription_id) = subscription_id else {
        warn!(%event_type, "Event carries no subscription id; acknowledged without changes.");
        return Ok(Control::Continue);
      };

      // A canceled subscription also loses its package; past_due keeps it while Stripe retries.
      let affected = sqlx::query(
        "UPDATE users SET subscription_status = $2,
           package_id = CASE WHEN $2 = 'canceled'::subscription_status THEN NULL ELSE package_id END,
           stripe_subscription_id = CASE WHEN $2 = 'canceled'::subscription_status THEN NULL ELSE stripe_subscription_id END,
           updated_at = NOW()
         WHERE stripe_subscription_id = $1",
      )
      .bind(&subscription_id)
      .bind(status)
      .execute(&pool)
      .await?
      .rows_affected();

      if affected == 0 {
        event!(Level::DEBUG, %subscription_id, "No user holds this subscription.");
      } else {
        info!(%subscription_id, ?status, affected, "Subscription status updated.");
      }
      ctx.write().affected_users = affected;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow
}

fn subscription_event_ctx(ctx: FlowCtx<StripeWebhookCtx>) -> Result<FlowCtx<SubscriptionEventCtx>, FlowError> {
  let (app_state, event_type, object) = event_object(&ctx)?;
  let subscription_id = subscription_id_of(&event_type, &object);
  Ok(FlowCtx::new(SubscriptionEventCtx { app_state, event_type, subscription_id, affected_users: 0 }))
}

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  let mut flow = Flow::<StripeWebhookCtx, AppError>::new(&[
    ("verify_signature", false, None),
    ("parse_event", false, None),
    ("record_event", false, None),
    (DISPATCH_STEP, false, None),
  ])
  .named("stripe_webhook");

  flow.on("verify_signature", |ctx: FlowCtx<StripeWebhookCtx>| {
    Box::pin(async move {
      let (payload, signature, secret) = {
        let guard = ctx.read();
        (guard.payload.clone(), guard.signature.clone(), guard.app_state.config.stripe_webhook_secret.clone())
      };
      let Some(secret) = secret else {
        warn!("Webhook signature check skipped: no signing secret configured.");
        return Ok(Control::Continue);
      };
      let header = signature.ok_or_else(|| AppError::Auth("Missing Stripe-Signature header.".to_string()))?;
      billing::verify_webhook_signature(&payload, &header, &secret, Utc::now().timestamp(), SIGNATURE_TOLERANCE_SECS)?;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("parse_event", |ctx: FlowCtx<StripeWebhookCtx>| {
    Box::pin(async move {
      let payload = ctx.read().payload.clone();
      let parsed = serde_json::from_slice::<StripeEvent>(&payload)
        .map_err(|e| AppError::Validation(format!("Malformed Stripe event: {}", e)))?;
      event!(Level::DEBUG, event_id = %parsed.id, event_type = %parsed.event_type, "Stripe event parsed.");
      ctx.write().event = Some(parsed);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("record_event", |ctx: FlowCtx<StripeWebhookCtx>| {
    Box::pin(async move {
      let (event, pool) = {
        let guard = ctx.read();
        (required(&guard.event, "event")?, guard.app_state.db_pool.clone())
      };

      let inserted = sqlx::query("INSERT INTO stripe_events (id, event_type) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
        .bind(&event.id)
        .bind(&event.event_type)
        .execute(&pool)
        .await?
        .rows_affected();
      if inserted == 0 {
        info!(event_id = %event.id, "Duplicate Stripe event acknowledged without reprocessing.");
        ctx.write().duplicate = true;
        return Ok(Control::Halt);
      }
      ctx.write().recorded = true;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow
    .branch(DISPATCH_STEP)
    .arm("checkout_completed", Arc::new(checkout_completed_flow()), |ctx: FlowCtx<StripeWebhookCtx>| {
      let (app_state, _, object) = event_object(&ctx)?;
      let completion = CheckoutCompletion::from_session(&object);
      Ok(FlowCtx::new(CheckoutCompletedCtx {
        app_state,
        user_id: completion.user_id,
        package_id: completion.package_id,
        customer_id: completion.customer_id,
        subscription_id: completion.subscription_id,
        user: None,
        package: None,
      }))
    })
    .when(|ctx| is_event(&ctx, CHECKOUT_COMPLETED))
    .arm(
      "subscription_deleted",
      Arc::new(subscription_status_flow("subscription_deleted", SubscriptionStatus::Canceled)),
      subscription_event_ctx,
    )
    .when(|ctx| is_event(&ctx, SUBSCRIPTION_DELETED))
    .arm(
      "payment_failed",
      Arc::new(subscription_status_flow("payment_failed", SubscriptionStatus::PastDue)),
      subscription_event_ctx,
    )
    .when(|ctx| is_event(&ctx, PAYMENT_FAILED))
    .otherwise(Control::Continue)
    .finish(false);

  registry.register(flow);
}
