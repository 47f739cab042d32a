// haven/server/src/web/handlers/package_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Package, Role};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PackageQuery {
  pub role: Option<String>,
}

#[instrument(name = "handler::list_packages", skip(app_state))]
pub async fn list_packages_handler(
  app_state: web::Data<AppState>,
  query: web::Query<PackageQuery>,
) -> AppResult<HttpResponse> {
  let role = match query.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
    Some(r) => Some(r.parse::<Role>().map_err(AppError::Validation)?),
    None => None,
  };
  let packages = Package::list_active(&app_state.db_pool, role).await?;
  Ok(HttpResponse::Ok().json(json!({ "packages": packages })))
}

#[instrument(name = "handler::get_package", skip(app_state))]
pub async fn get_package_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
  let package = Package::find_by_id(&app_state.db_pool, path.into_inner())
    .await?
    .filter(|p| p.is_active)
    .ok_or_else(|| AppError::NotFound("Package not found.".to_string()))?;
  Ok(HttpResponse::Ok().json(json!({ "package": package })))
}
