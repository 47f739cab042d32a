// haven/server/src/db.rs

use crate::config::AppConfig;
use crate::errors::Result as AppResult;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, instrument};

pub async fn connect(config: &AppConfig) -> AppResult<PgPool> {
  connect_url(&config.database_url, config.database_max_connections).await
}

#[instrument(name = "db::connect", skip(database_url))]
pub async fn connect_url(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
  let pool = PgPoolOptions::new()
    .max_connections(max_connections)
    .acquire_timeout(Duration::from_secs(5))
    .connect(database_url)
    .await?;
  info!("Connected to the database.");
  Ok(pool)
}

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
  sqlx::migrate!("./migrations").run(pool).await?;
  info!("Database migrations applied.");
  Ok(())
}

pub async fn ping(pool: &PgPool) -> AppResult<()> {
  sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
  Ok(())
}
