// haven/server/src/web/handlers/public_handlers.rs

use actix_web::http::header::{CacheControl, CacheDirective, ContentType};
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{instrument, warn};

use crate::db;
use crate::errors::{AppError, Result as AppResult};
use crate::seo::{self, SitemapEntry};
use crate::services::storage::content_type_for;
use crate::state::AppState;

pub async fn health_handler(app_state: web::Data<AppState>) -> HttpResponse {
  match db::ping(&app_state.db_pool).await {
    Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok", "database": "ok" })),
    Err(e) => {
      warn!(error = %e, "Health check: database unreachable.");
      HttpResponse::ServiceUnavailable().json(json!({ "status": "degraded", "database": "unreachable" }))
    }
  }
}

#[instrument(name = "handler::sitemap", skip(app_state))]
pub async fn sitemap_handler(app_state: web::Data<AppState>) -> AppResult<HttpResponse> {
  let entries = SitemapEntry::active_listings(&app_state.db_pool).await?;
  let xml = seo::sitemap_xml(&app_state.config.app_base_url, &entries);
  Ok(
    HttpResponse::Ok()
      .insert_header(ContentType::xml())
      .insert_header(CacheControl(vec![CacheDirective::Public, CacheDirective::MaxAge(3600)]))
      .body(xml),
  )
}

/// Serves stored listing photos back out of the object store.
#[instrument(name = "handler::upload", skip(app_state))]
pub async fn upload_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
  let key = path.into_inner();
  let bytes = app_state
    .store
    .get(&key)
    .await?
    .ok_or_else(|| AppError::NotFound("File not found.".to_string()))?;
  Ok(
    HttpResponse::Ok()
      .content_type(content_type_for(&key))
      .insert_header(CacheControl(vec![CacheDirective::Public, CacheDirective::MaxAge(86_400)]))
      .body(bytes),
  )
}
