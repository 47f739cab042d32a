// haven/server/src/lib.rs

//! Haven: a real-estate listing marketplace API on actix-web, sqlx and haven-flow workflows.

pub mod catalogue;
pub mod config;
pub mod db;
pub mod errors;
pub mod gating;
pub mod models;
pub mod pipelines;
pub mod seo;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod web;

pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use state::AppState;
