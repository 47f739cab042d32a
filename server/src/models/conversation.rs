// haven/server/src/models/conversation.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A two-party thread, optionally about a listing. `user_a < user_b` always holds.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
  pub id: Uuid,
  pub listing_id: Option<Uuid>,
  pub user_a: Uuid,
  pub user_b: Uuid,
  pub last_message_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
  pub id: Uuid,
  pub conversation_id: Uuid,
  pub sender_id: Uuid,
  pub body: String,
  pub read_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

/// Orders a participant pair the way the table stores it.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
  if a < b {
    (a, b)
  } else {
    (b, a)
  }
}

impl Conversation {
  pub fn involves(&self, user_id: Uuid) -> bool {
    self.user_a == user_id || self.user_b == user_id
  }

  pub fn other_participant(&self, user_id: Uuid) -> Uuid {
    if self.user_a == user_id {
      self.user_b
    } else {
      self.user_a
    }
  }

  pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
      .bind(id)
      .fetch_optional(pool)
      .await
  }

  /// Returns the existing thread for this pair and listing, creating it when absent.
  pub async fn find_or_create(
    pool: &PgPool,
    listing_id: Option<Uuid>,
    first: Uuid,
    second: Uuid,
  ) -> Result<Conversation, sqlx::Error> {
    let (user_a, user_b) = ordered_pair(first, second);
    let existing = sqlx::query_as::<_, Conversation>(
      "SELECT * FROM conversations WHERE user_a = $1 AND user_b = $2 AND listing_id IS NOT DISTINCT FROM $3",
    )
    .bind(user_a)
    .bind(user_b)
    .bind(listing_id)
    .fetch_optional(pool)
    .await?;
    if let Some(conversation) = existing {
      return Ok(conversation);
    }

    sqlx::query_as::<_, Conversation>(
      "INSERT INTO conversations (id, listing_id, user_a, user_b) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(listing_id)
    .bind(user_a)
    .bind(user_b)
    .fetch_one(pool)
    .await
  }

  pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Conversation>, sqlx::Error> {
    sqlx::query_as::<_, Conversation>(
      "SELECT * FROM conversations WHERE user_a = $1 OR user_b = $1 ORDER BY last_message_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
  }
}

impl Message {
  pub async fn post(pool: &PgPool, conversation_id: Uuid, sender_id: Uuid, body: &str) -> Result<Message, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let message = sqlx::query_as::<_, Message>(
      "INSERT INTO messages (id, conversation_id, sender_id, body) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(conversation_id)
    .bind(sender_id)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
      .bind(conversation_id)
      .bind(message.created_at)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pair_is_order_independent() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    let (low, high) = ordered_pair(a, b);
    assert!(low < high);
  }
}
