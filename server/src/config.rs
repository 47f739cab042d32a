// haven/server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub database_max_connections: u32,
  pub app_base_url: String,

  pub session_secret: String,
  pub session_ttl_hours: i64,

  // Stripe is optional; without a secret key the mock gateway is used.
  pub stripe_secret_key: Option<String>,
  pub stripe_webhook_secret: Option<String>,
  pub stripe_api_base: String,

  pub email_sender: String,

  pub storage_root: PathBuf,
  pub storage_public_url: String,
  pub max_upload_bytes: usize,

  pub run_migrations: bool,
  pub log_format: LogFormat,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    let optional_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let database_max_connections = get_env("DATABASE_MAX_CONNECTIONS")
      .unwrap_or_else(|_| "10".to_string())
      .parse::<u32>()
      .map_err(|e| AppError::Config(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", e)))?;
    let app_base_url = get_env("APP_BASE_URL")
      .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();

    let session_secret = get_env("SESSION_SECRET")?;
    if session_secret.len() < 32 {
      return Err(AppError::Config("SESSION_SECRET must be at least 32 bytes long".to_string()));
    }
    let session_ttl_hours = get_env("SESSION_TTL_HOURS")
      .unwrap_or_else(|_| "168".to_string())
      .parse::<i64>()
      .map_err(|e| AppError::Config(format!("Invalid SESSION_TTL_HOURS: {}", e)))?;

    let stripe_secret_key = optional_env("STRIPE_SECRET_KEY");
    let stripe_webhook_secret = optional_env("STRIPE_WEBHOOK_SECRET");
    let stripe_api_base = get_env("STRIPE_API_BASE")
      .unwrap_or_else(|_| "https://api.stripe.com".to_string())
      .trim_end_matches('/')
      .to_string();

    let email_sender = get_env("EMAIL_SENDER").unwrap_or_else(|_| "noreply@haven.local".to_string());

    let storage_root = PathBuf::from(get_env("STORAGE_ROOT").unwrap_or_else(|_| "./uploads".to_string()));
    let storage_public_url = get_env("STORAGE_PUBLIC_URL")
      .unwrap_or_else(|_| format!("{}/uploads", app_base_url))
      .trim_end_matches('/')
      .to_string();
    let max_upload_bytes = get_env("MAX_UPLOAD_BYTES")
      .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
      .parse::<usize>()
      .map_err(|e| AppError::Config(format!("Invalid MAX_UPLOAD_BYTES: {}", e)))?;

    let run_migrations = get_env("RUN_MIGRATIONS")
      .unwrap_or_else(|_| "true".to_string())
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid RUN_MIGRATIONS value: {}", e)))?;
    let log_format = match get_env("LOG_FORMAT").unwrap_or_default().to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      "" | "pretty" => LogFormat::Pretty,
      other => return Err(AppError::Config(format!("Invalid LOG_FORMAT '{}': expected pretty or json", other))),
    };

    Ok(Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      app_base_url,
      session_secret,
      session_ttl_hours,
      stripe_secret_key,
      stripe_webhook_secret,
      stripe_api_base,
      email_sender,
      storage_root,
      storage_public_url,
      max_upload_bytes,
      run_migrations,
      log_format,
    })
  }

  /// Fixed settings for tests. Reads nothing from the environment.
  pub fn for_tests(database_url: &str) -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 0,
      database_url: database_url.to_string(),
      database_max_connections: 1,
      app_base_url: "http://localhost:8080".to_string(),
      session_secret: "test-session-secret-that-is-long-enough-0123".to_string(),
      session_ttl_hours: 1,
      stripe_secret_key: None,
      stripe_webhook_secret: None,
      stripe_api_base: "https://api.stripe.com".to_string(),
      email_sender: "noreply@haven.test".to_string(),
      storage_root: env::temp_dir().join("haven-test-uploads"),
      storage_public_url: "http://localhost:8080/uploads".to_string(),
      max_upload_bytes: 1024 * 1024,
      run_migrations: false,
      log_format: LogFormat::Pretty,
    }
  }
}
