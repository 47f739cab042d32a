// haven/server/src/web/handlers/conversation_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{event, instrument, warn, Level};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Conversation, Message};
use crate::state::AppState;
use crate::web::AuthenticatedUser;

pub const MESSAGE_MAX_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct MessagePayload {
  pub body: String,
}

async fn load_participating(pool: &PgPool, conversation_id: Uuid, user_id: Uuid) -> AppResult<Conversation> {
  let conversation = Conversation::find_by_id(pool, conversation_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Conversation not found.".to_string()))?;
  if !conversation.involves(user_id) {
    warn!(%conversation_id, %user_id, "Conversation access denied.");
    return Err(AppError::Forbidden("You are not part of this conversation.".to_string()));
  }
  Ok(conversation)
}

#[instrument(name = "handler::list_conversations", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn list_conversations_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> AppResult<HttpResponse> {
  let conversations = Conversation::list_for_user(&app_state.db_pool, auth.user_id).await?;
  let items: Vec<_> = conversations
    .iter()
    .map(|c| {
      json!({
        "conversation": c,
        "otherParticipant": c.other_participant(auth.user_id),
      })
    })
    .collect();
  Ok(HttpResponse::Ok().json(json!({ "conversations": items })))
}

/// Thread contents. Messages from the other side are marked read.
#[instrument(name = "handler::list_messages", skip(app_state), fields(user_id = %auth.user_id))]
pub async fn list_messages_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
  let pool = &app_state.db_pool;
  let conversation = load_participating(pool, path.into_inner(), auth.user_id).await?;

  let marked = sqlx::query(
    "UPDATE messages SET read_at = NOW() WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL",
  )
  .bind(conversation.id)
  .bind(auth.user_id)
  .execute(pool)
  .await?
  .rows_affected();
  event!(Level::DEBUG, conversation_id = %conversation.id, marked, "Messages marked read.");

  let messages =
    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at, id")
      .bind(conversation.id)
      .fetch_all(pool)
      .await?;
  Ok(HttpResponse::Ok().json(json!({ "conversation": conversation, "messages": messages })))
}

#[instrument(name = "handler::send_message", skip(app_state, payload), fields(user_id = %auth.user_id))]
pub async fn send_message_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
  path: web::Path<Uuid>,
  payload: web::Json<MessagePayload>,
) -> AppResult<HttpResponse> {
  let body = payload.into_inner().body.trim().to_string();
  if body.is_empty() || body.chars().count() > MESSAGE_MAX_CHARS {
    return Err(AppError::Validation(format!(
      "Message must be between 1 and {} characters.",
      MESSAGE_MAX_CHARS
    )));
  }

  let pool = &app_state.db_pool;
  let conversation = load_participating(pool, path.into_inner(), auth.user_id).await?;
  let message = Message::post(pool, conversation.id, auth.user_id, &body).await?;
  Ok(HttpResponse::Created().json(json!({ "message": message })))
}
