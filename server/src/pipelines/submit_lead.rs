// haven/server/src/pipelines/submit_lead.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Conversation, Lead, Listing, ListingStatus, Message, User};
use crate::pipelines::common_steps::{normalize_email, required};
use crate::pipelines::contexts::SubmitLeadCtx;
use haven_flow::{Control, Flow, FlowCtx, FlowRegistry, SkipIf};
use std::sync::Arc;
use tracing::{event, info, warn, Level};
use uuid::Uuid;

pub const LEAD_MESSAGE_MAX_CHARS: usize = 2000;
pub const LEAD_NAME_MAX_CHARS: usize = 100;

/// Trims and checks the contact form fields. Returns the normalized email.
pub fn validate_lead_fields(name: &str, email: &str, message: &str) -> AppResult<String> {
  let name = name.trim();
  if name.is_empty() || name.chars().count() > LEAD_NAME_MAX_CHARS {
    return Err(AppError::Validation(format!(
      "Name is required and must be at most {} characters.",
      LEAD_NAME_MAX_CHARS
    )));
  }
  let message = message.trim();
  if message.is_empty() {
    return Err(AppError::Validation("Message is required.".to_string()));
  }
  if message.chars().count() > LEAD_MESSAGE_MAX_CHARS {
    return Err(AppError::Validation(format!(
      "Message must be at most {} characters.",
      LEAD_MESSAGE_MAX_CHARS
    )));
  }
  normalize_email(email)
}

pub fn register_flow(registry: &FlowRegistry<AppError>) {
  // Anonymous senders and agents writing to themselves get no thread.
  let no_thread: SkipIf<SubmitLeadCtx> = Arc::new(|ctx: FlowCtx<SubmitLeadCtx>| {
    ctx.with(|c| match (c.sender_id, c.agent.as_ref()) {
      (Some(sender), Some(agent)) => sender == agent.id,
      _ => true,
    })
  });

  let mut flow = Flow::<SubmitLeadCtx, AppError>::new(&[
    ("validate_input", false, None),
    ("load_listing", false, None),
    ("insert_lead", false, None),
    ("open_conversation", false, Some(no_thread)),
    ("notify_agent", true, None),
  ])
  .named("submit_lead");

  flow.on("validate_input", |ctx: FlowCtx<SubmitLeadCtx>| {
    Box::pin(async move {
      let (name, email, message) = {
        let guard = ctx.read();
        (guard.name.clone(), guard.email.clone(), guard.message.clone())
      };
      let email = validate_lead_fields(&name, &email, &message)?;

      ctx.update(|c| {
        c.email = email;
        c.name = c.name.trim().to_string();
        c.message = c.message.trim().to_string();
        c.phone = c.phone.take().map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
      });
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("load_listing", |ctx: FlowCtx<SubmitLeadCtx>| {
    Box::pin(async move {
      let (listing_id, pool) = {
        let guard = ctx.read();
        (guard.listing_id, guard.app_state.db_pool.clone())
      };

      let listing = Listing::find_by_id(&pool, listing_id)
        .await?
        .filter(|l| l.status == ListingStatus::Active)
        .ok_or_else(|| AppError::NotFound("Listing not found.".to_string()))?;
      let agent = User::find_by_id(&pool, listing.owner_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Listing {} has no owner.", listing.id)))?;

      let mut guard = ctx.write();
      guard.listing = Some(listing);
      guard.agent = Some(agent);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("insert_lead", |ctx: FlowCtx<SubmitLeadCtx>| {
    Box::pin(async move {
      let (listing, agent, sender_id, name, email, phone, message, pool) = {
        let guard = ctx.read();
        (
          required(&guard.listing, "listing")?,
          required(&guard.agent, "agent")?,
          guard.sender_id,
          guard.name.clone(),
          guard.email.clone(),
          guard.phone.clone(),
          guard.message.clone(),
          guard.app_state.db_pool.clone(),
        )
      };

      let lead = sqlx::query_as::<_, Lead>(
        "INSERT INTO leads (id, listing_id, agent_id, sender_id, name, email, phone, message)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
      )
      .bind(Uuid::new_v4())
      .bind(listing.id)
      .bind(agent.id)
      .bind(sender_id)
      .bind(&name)
      .bind(&email)
      .bind(&phone)
      .bind(&message)
      .fetch_one(&pool)
      .await?;

      info!(lead_id = %lead.id, listing_id = %listing.id, agent_id = %agent.id, "Lead recorded.");
      ctx.write().lead = Some(lead);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("open_conversation", |ctx: FlowCtx<SubmitLeadCtx>| {
    Box::pin(async move {
      let (listing, agent, sender_id, message, pool) = {
        let guard = ctx.read();
        (
          required(&guard.listing, "listing")?,
          required(&guard.agent, "agent")?,
          required(&guard.sender_id, "sender")?,
          guard.message.clone(),
          guard.app_state.db_pool.clone(),
        )
      };

      let conversation = Conversation::find_or_create(&pool, Some(listing.id), sender_id, agent.id).await?;
      Message::post(&pool, conversation.id, sender_id, &message).await?;
      event!(Level::DEBUG, conversation_id = %conversation.id, "Lead appended to conversation.");
      ctx.write().conversation_id = Some(conversation.id);
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flow.on("notify_agent", |ctx: FlowCtx<SubmitLeadCtx>| {
    Box::pin(async move {
      let (listing, agent, name, email, message, mailer) = {
        let guard = ctx.read();
        (
          required(&guard.listing, "listing")?,
          required(&guard.agent, "agent")?,
          guard.name.clone(),
          guard.email.clone(),
          guard.message.clone(),
          guard.app_state.mailer.clone(),
        )
      };

      if let Err(e) = mailer
        .send_lead_notification(&agent.email, &listing.title, &name, &email, &message)
        .await
      {
        warn!(error = %e, agent_id = %agent.id, "Lead notification not delivered.");
        return Err(e);
      }
      ctx.write().agent_notified = true;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  registry.register(flow);
}
