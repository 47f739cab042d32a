// haven/server/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use haven_server::config::AppConfig;
use haven_server::state::AppState;
use haven_server::{db, telemetry, web};
use std::io;

fn to_io(e: haven_server::AppError) -> io::Error {
  io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  let app_config = AppConfig::from_env().map_err(|e| {
    eprintln!("Failed to load application configuration: {}", e);
    to_io(e)
  })?;
  telemetry::init_tracing(app_config.log_format);
  tracing::info!(
    stripe_enabled = app_config.stripe_secret_key.is_some(),
    webhook_signing = app_config.stripe_webhook_secret.is_some(),
    "Starting Haven server..."
  );

  let db_pool = db::connect(&app_config).await.map_err(|e| {
    tracing::error!(error = %e, "Failed to connect to the database.");
    to_io(e)
  })?;
  if app_config.run_migrations {
    db::run_migrations(&db_pool).await.map_err(to_io)?;
  }

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let app_state = AppState::build(app_config, db_pool).map_err(to_io)?;

  tracing::info!("Binding server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .app_data(web::json_config())
      .app_data(web::query_config())
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
