// haven/server/src/web/mod.rs

pub mod extractors;
pub mod handlers;
pub mod routes;

use crate::errors::AppError;
use actix_web::web;

pub use extractors::{AuthenticatedUser, MaybeUser};
pub use routes::configure_app_routes;

/// JSON body limits and errors in the API's `{ "error": ... }` shape.
pub fn json_config() -> web::JsonConfig {
  web::JsonConfig::default()
    .limit(256 * 1024)
    .error_handler(|err, _req| AppError::Validation(format!("Invalid JSON body: {}", err)).into())
}

/// Query string errors in the same shape.
pub fn query_config() -> web::QueryConfig {
  web::QueryConfig::default().error_handler(|err, _req| AppError::Validation(format!("Invalid query: {}", err)).into())
}
