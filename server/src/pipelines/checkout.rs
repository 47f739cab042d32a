// haven/server/src/pipelines/checkout.rs

use crate::errors::AppError;
use crate::gating;
use crate::models::{Package, User};
use crate::pipelines::common_steps::required;
use crate::pipelines::contexts::CheckoutCtx;
use crate::services::billing::CheckoutRequest;
use haven_flow::{Control, Flow, FlowCtx, FlowRegistry, SkipIf};
use std::sync::Arc;
use tracing::{info, warn};

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  let not_upgrade: SkipIf<CheckoutCtx> = Arc::new(|ctx: FlowCtx<CheckoutCtx>| ctx.with(|c| !c.upgrade));

  let mut flow = Flow::<CheckoutCtx, AppError>::new(&[
    ("load_user", false, None),
    ("load_package", false, None),
    ("check_eligibility", false, None),
    ("check_upgrade", false, Some(not_upgrade)),
    ("create_session", false, None),
  ])
  .named("checkout");

  flow.on("load_user", |ctx: FlowCtx<CheckoutCtx>| {
    Box::pin(async move {
      let (user_id, pool) = {
        let guard = ctx.read();
        (guard.user_id, guard.app_state.db_pool.clone())
      };
      let user = User::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Account no longer exists.".to_string()))?;
      let current = Package::for_user(&pool, user.package_id).await?;

      let mut guard = ctx.write();
      guard.user = Some(user);
      guard.current_package = current;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("load_package", |ctx: FlowCtx<CheckoutCtx>| {
    Box::pin(async move {
      let (package_id, pool) = {
        let guard = ctx.read();
        (guard.package_id, guard.app_state.db_pool.clone())
      };
      let package = Package::find_by_id(&pool, package_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Package not found.".to_string()))?;
      ctx.write().target_package = Some(package);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("check_eligibility", |ctx: FlowCtx<CheckoutCtx>| {
    Box::pin(async move {
      let (user, current, target, mock_billing) = {
        let guard = ctx.read();
        (
          required(&guard.user, "user")?,
          guard.current_package.clone(),
          required(&guard.target_package, "target package")?,
          guard.app_state.billing.is_mock(),
        )
      };

      if !gating::package_assignable(user.role, &target) {
        warn!(user_id = %user.id, role = %user.role, package = %target.name, "Package not available to role.");
        return Err(AppError::Forbidden(format!("The {} package is not available for your account type.", target.name)));
      }
      if target.is_free() {
        return Err(AppError::Validation("The free package does not require checkout.".to_string()));
      }
      let already_on_it = current.as_ref().is_some_and(|c| c.id == target.id) && user.subscription_status.grants_access();
      if already_on_it {
        return Err(AppError::Conflict(format!("You are already subscribed to {}.", target.name)));
      }
      if target.stripe_price_id.is_none() && !mock_billing {
        return Err(AppError::Payment(format!("The {} package is not available for purchase yet.", target.name)));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("check_upgrade", |ctx: FlowCtx<CheckoutCtx>| {
    Box::pin(async move {
      let (user, current, target) = {
        let guard = ctx.read();
        (required(&guard.user, "user")?, guard.current_package.clone(), required(&guard.target_package, "target package")?)
      };

      let live_current = current.filter(|c| !c.is_free() && user.subscription_status.grants_access());
      if live_current.is_none() {
        return Err(AppError::Validation("No active subscription to upgrade. Use checkout instead.".to_string()));
      }
      if !gating::is_upgrade(live_current.as_ref(), &target) {
        return Err(AppError::Validation(format!("{} is not an upgrade from your current package.", target.name)));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("create_session", |ctx: FlowCtx<CheckoutCtx>| {
    Box::pin(async move {
      let (user, target, billing, base_url) = {
        let guard = ctx.read();
        (
          required(&guard.user, "user")?,
          required(&guard.target_package, "target package")?,
          guard.app_state.billing.clone(),
          guard.app_state.config.app_base_url.clone(),
        )
      };

      let request = CheckoutRequest {
        user_id: user.id,
        package_id: target.id,
        package_name: target.name.clone(),
        price_id: target.stripe_price_id.clone(),
        customer_email: user.email.clone(),
        customer_id: user.stripe_customer_id.clone(),
        success_url: format!("{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}", base_url),
        cancel_url: format!("{}/pricing", base_url),
      };
      let session = billing.create_checkout_session(&request).await?;
      info!(user_id = %user.id, package = %target.name, session_id = %session.id, gateway = billing.name(), "Checkout session ready.");
      ctx.write().session = Some(session);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(flow);
}
