// haven/server/src/pipelines/mod.rs

//! Request workflows built on `haven-flow`. Each module registers one flow,
//! keyed by its context type, so handlers only build a context and run it.

use crate::errors::AppError;
use haven_flow::FlowRegistry;

pub mod common_steps;
pub mod contexts;

pub mod checkout;
pub mod create_listing;
pub mod login;
pub mod register;
pub mod stripe_webhook;
pub mod submit_lead;
pub mod upload_image;
pub mod verify_email;

/// Registers every workflow. Called once while building `AppState`.
pub fn register_all_flows(registry: &FlowRegistry<AppError>) {
  register::register_flow(registry);
  login::register_flow(registry);
  verify_email::register_flow(registry);
  create_listing::register_flow(registry);
  upload_image::register_flow(registry);
  checkout::register_flow(registry);
  stripe_webhook::register_flow(registry);
  submit_lead::register_flow(registry);

  tracing::info!(count = registry.len(), "Workflows registered.");
}
