// haven/server/src/models/lead.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
  New,
  Contacted,
  Closed,
}

/// An inquiry sent through a listing's contact form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Lead {
  pub id: Uuid,
  pub listing_id: Uuid,
  pub agent_id: Uuid,
  pub sender_id: Option<Uuid>,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub message: String,
  pub status: LeadStatus,
  pub created_at: DateTime<Utc>,
}
