// haven/server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use haven_flow::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Listing limit reached ({used}/{limit})")]
  LimitReached { used: i64, limit: i64 },

  #[error("Payload Too Large: {0}")]
  PayloadTooLarge(String),

  #[error("Payment Processing Error: {0}")]
  Payment(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("Billing Provider Error: {0}")]
  Billing(String),

  #[error("Storage Error: {0}")]
  Storage(String),

  #[error("Image Processing Error: {0}")]
  Image(String),

  #[error("Workflow Error: {source}")]
  Flow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<sqlx::Error> for AppError {
  fn from(err: sqlx::Error) -> Self {
    // 23505: unique_violation (duplicate email, slug, ...)
    if let sqlx::Error::Database(db_err) = &err {
      if db_err.code().as_deref() == Some("23505") {
        let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
        return AppError::Conflict(format!("Duplicate value violates {}", constraint));
      }
    }
    AppError::Sqlx(err)
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<AppError>() {
      Ok(app_err) => app_err,
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => AppError::from(sqlx_err),
        Err(other) => AppError::Internal(other.to_string()),
      },
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) | AppError::LimitReached { .. } => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      AppError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with server error");
    } else {
      tracing::warn!(application_error = %self, "Responding with client error");
    }

    let body = match self {
      AppError::Validation(m)
      | AppError::Auth(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m)
      | AppError::PayloadTooLarge(m)
      | AppError::Payment(m) => json!({ "error": m }),
      AppError::LimitReached { used, limit } => json!({
        "error": "Listing limit reached for your current package.",
        "used": used,
        "limit": limit,
      }),
      AppError::Billing(_) => json!({ "error": "Payment provider error" }),
      AppError::Config(_) => json!({ "error": "Configuration issue" }),
      AppError::Sqlx(_) | AppError::Migrate(_) => json!({ "error": "Database operation failed" }),
      AppError::Storage(_) => json!({ "error": "File storage failed" }),
      AppError::Image(m) => json!({ "error": "Image could not be processed", "detail": m }),
      AppError::Flow { .. } => json!({ "error": "Workflow processing error" }),
      AppError::Internal(_) => json!({ "error": "An internal error occurred" }),
    };

    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
