// haven/server/src/web/handlers/mod.rs

pub mod agent_handlers;
pub mod auth_handlers;
pub mod billing_handlers;
pub mod conversation_handlers;
pub mod favorite_handlers;
pub mod image_handlers;
pub mod lead_handlers;
pub mod listing_handlers;
pub mod package_handlers;
pub mod public_handlers;
pub mod user_handlers;
pub mod webhook_handlers;

use crate::errors::{AppError, Result as AppResult};
use crate::state::AppState;
use haven_flow::{FlowCtx, Outcome};
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// Runs the flow registered for `T` and insists it finished every step.
pub(crate) async fn run_flow<T>(state: &AppState, ctx: FlowCtx<T>) -> AppResult<FlowCtx<T>>
where
  T: Send + Sync + 'static,
{
  match state.flows.run(ctx.clone()).await? {
    Outcome::Completed => Ok(ctx),
    Outcome::Halted => {
      warn!(payload = std::any::type_name::<T>(), "Workflow halted before completion.");
      Err(AppError::Internal("Request processing stopped early.".to_string()))
    }
  }
}

/// For partial updates: a missing field stays `None`, an explicit `null` becomes `Some(None)`.
/// Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}
