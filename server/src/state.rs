// haven/server/src/state.rs

use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::pipelines;
use crate::services::{
  BillingGateway, ImageProcessor, LocalObjectStore, Mailer, MockGateway, ObjectStore, SessionTokens, StripeGateway,
};
use haven_flow::FlowRegistry;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
  pub tokens: Arc<SessionTokens>,
  pub billing: Arc<dyn BillingGateway>,
  pub store: Arc<dyn ObjectStore>,
  pub mailer: Arc<Mailer>,
  pub images: Arc<ImageProcessor>,
}

impl AppState {
  /// Wires services from configuration and registers every workflow.
  pub fn build(config: AppConfig, db_pool: PgPool) -> AppResult<Self> {
    let billing: Arc<dyn BillingGateway> = match &config.stripe_secret_key {
      Some(key) => Arc::new(StripeGateway::new(&config.stripe_api_base, key)?),
      None => {
        warn!("STRIPE_SECRET_KEY not set; using the mock billing gateway.");
        Arc::new(MockGateway::new(&config.app_base_url))
      }
    };
    if config.stripe_webhook_secret.is_none() {
      warn!("STRIPE_WEBHOOK_SECRET not set; webhook signatures will not be verified.");
    }

    let store: Arc<dyn ObjectStore> =
      Arc::new(LocalObjectStore::new(config.storage_root.clone(), &config.storage_public_url));
    let tokens = Arc::new(SessionTokens::new(&config.session_secret, config.session_ttl_hours));
    let mailer = Arc::new(Mailer::new(config.email_sender.clone(), config.app_base_url.clone()));

    let flows = Arc::new(FlowRegistry::<AppError>::new());
    pipelines::register_all_flows(&flows);
    info!(flows = flows.len(), billing = billing.name(), "Application state ready.");

    Ok(Self {
      db_pool,
      flows,
      config: Arc::new(config),
      tokens,
      billing,
      store,
      mailer,
      images: Arc::new(ImageProcessor::default()),
    })
  }
}
