// haven/server/tests/flow_db_tests.rs

//! Workflows that read and write Postgres. Point `HAVEN_TEST_DATABASE_URL` at a
//! scratch database to run them; without it every test returns early.

use actix_web::http::StatusCode;
use actix_web::{test, web as actix_data, App};
use haven_flow::FlowCtx;
use haven_server::config::AppConfig;
use haven_server::db;
use haven_server::models::{Role, SubscriptionStatus};
use haven_server::pipelines::contexts::UploadImageCtx;
use haven_server::state::AppState;
use haven_server::web;
use hmac::{Hmac, Mac};
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgba};
use serde_json::{json, Value};
use serial_test::serial;
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::Cursor;
use uuid::Uuid;

const DATABASE_ENV: &str = "HAVEN_TEST_DATABASE_URL";
const WEBHOOK_SECRET: &str = "whsec_flow_tests";

async fn test_state_with(configure: impl FnOnce(&mut AppConfig)) -> Option<AppState> {
  let Ok(url) = std::env::var(DATABASE_ENV) else {
    eprintln!("{} not set; skipping database test", DATABASE_ENV);
    return None;
  };
  let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.expect("test database reachable");
  db::run_migrations(&pool).await.expect("migrations apply");

  let mut config = AppConfig::for_tests(&url);
  config.stripe_webhook_secret = Some(WEBHOOK_SECRET.to_string());
  configure(&mut config);
  Some(AppState::build(config, pool).expect("state builds"))
}

async fn test_state() -> Option<AppState> {
  test_state_with(|_| {}).await
}

macro_rules! app {
  ($state:expr) => {
    test::init_service(
      App::new()
        .app_data(actix_data::Data::new($state))
        .app_data(web::json_config())
        .app_data(web::query_config())
        .configure(web::configure_app_routes),
    )
    .await
  };
}

async fn insert_user(pool: &PgPool, role: Role, subscription_id: Option<&str>) -> Uuid {
  let id = Uuid::new_v4();
  sqlx::query(
    "INSERT INTO users (id, email, password_hash, name, role, email_verified, subscription_status, stripe_subscription_id)
     VALUES ($1, $2, 'not-a-real-hash', 'Flow Test', $3, TRUE, $4, $5)",
  )
  .bind(id)
  .bind(format!("{}@haven.test", id))
  .bind(role)
  .bind(if subscription_id.is_some() { SubscriptionStatus::Active } else { SubscriptionStatus::Inactive })
  .bind(subscription_id)
  .execute(pool)
  .await
  .expect("user inserted");
  id
}

async fn insert_paid_package(pool: &PgPool) -> Uuid {
  let id = Uuid::new_v4();
  sqlx::query(
    "INSERT INTO packages (id, name, role, price_cents, listings_max, stripe_price_id)
     VALUES ($1, $2, 'AGENT', 2900, 10, 'price_test')",
  )
  .bind(id)
  .bind(format!("Test {}", id.simple()))
  .execute(pool)
  .await
  .expect("package inserted");
  id
}

async fn insert_listing(pool: &PgPool, owner_id: Uuid, status: &str) -> Uuid {
  let id = Uuid::new_v4();
  sqlx::query(
    "INSERT INTO listings (id, owner_id, title, slug, property_type, listing_type, status, price_cents, city, state)
     VALUES ($1, $2, 'Test Home', $3, 'house', 'sale', $4::listing_status, 25000000, 'Austin', 'TX')",
  )
  .bind(id)
  .bind(owner_id)
  .bind(format!("test-home-{}", id.simple()))
  .bind(status)
  .execute(pool)
  .await
  .expect("listing inserted");
  id
}

fn bearer(state: &AppState, user_id: Uuid, role: Role) -> (&'static str, String) {
  let token = state.tokens.issue(user_id, role).expect("token issued");
  ("Authorization", format!("Bearer {}", token))
}

fn signed(payload: &Value) -> (String, String) {
  let body = payload.to_string();
  let t = chrono::Utc::now().timestamp();
  let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
  mac.update(format!("{}.", t).as_bytes());
  mac.update(body.as_bytes());
  (body, format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes())))
}

fn webhook_request(payload: &Value) -> test::TestRequest {
  let (body, signature) = signed(payload);
  test::TestRequest::post()
    .uri("/api/v1/webhooks/stripe")
    .insert_header(("Stripe-Signature", signature))
    .insert_header(("content-type", "application/json"))
    .set_payload(body)
}

fn png(width: u32, height: u32) -> Vec<u8> {
  let buffer = ImageBuffer::from_pixel(width, height, Rgba([200u8, 160, 90, 255]));
  let mut out = Vec::new();
  DynamicImage::ImageRgba8(buffer)
    .write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)
    .unwrap();
  out
}

fn listing_body(title: &str) -> Value {
  json!({
    "title": title,
    "description": "Bright corner unit.",
    "property_type": "condo",
    "listing_type": "sale",
    "price_cents": 32_500_000,
    "city": "Austin",
    "state": "TX"
  })
}

#[actix_web::test]
#[serial]
async fn duplicate_webhook_event_is_processed_once() {
  let Some(state) = test_state().await else { return };
  let app = app!(state);
  let event = json!({
    "id": format!("evt_{}", Uuid::new_v4().simple()),
    "type": "customer.updated",
    "data": { "object": { "id": "cus_1" } }
  });

  let first: Value = test::read_body_json(test::call_service(&app, webhook_request(&event).to_request()).await).await;
  assert_eq!(first["duplicate"], false);

  let resp = test::call_service(&app, webhook_request(&event).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let second: Value = test::read_body_json(resp).await;
  assert_eq!(second["duplicate"], true);
}

#[actix_web::test]
#[serial]
async fn checkout_completed_activates_the_package() {
  let Some(state) = test_state().await else { return };
  let pool = state.db_pool.clone();
  let user_id = insert_user(&pool, Role::Agent, None).await;
  let package_id = insert_paid_package(&pool).await;
  let subscription = format!("sub_{}", Uuid::new_v4().simple());
  let app = app!(state);

  let event = json!({
    "id": format!("evt_{}", Uuid::new_v4().simple()),
    "type": "checkout.session.completed",
    "data": { "object": {
      "client_reference_id": user_id.to_string(),
      "customer": "cus_flow",
      "subscription": subscription,
      "metadata": { "package_id": package_id.to_string() }
    } }
  });
  let resp = test::call_service(&app, webhook_request(&event).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let (pkg, status, sub): (Option<Uuid>, SubscriptionStatus, Option<String>) =
    sqlx::query_as("SELECT package_id, subscription_status, stripe_subscription_id FROM users WHERE id = $1")
      .bind(user_id)
      .fetch_one(&pool)
      .await
      .unwrap();
  assert_eq!(pkg, Some(package_id));
  assert_eq!(status, SubscriptionStatus::Active);
  assert_eq!(sub.as_deref(), Some(subscription.as_str()));
}

#[actix_web::test]
#[serial]
async fn subscription_events_update_status() {
  let Some(state) = test_state().await else { return };
  let pool = state.db_pool.clone();
  let failing_sub = format!("sub_{}", Uuid::new_v4().simple());
  let deleted_sub = format!("sub_{}", Uuid::new_v4().simple());
  let failing_user = insert_user(&pool, Role::Agent, Some(&failing_sub)).await;
  let deleted_user = insert_user(&pool, Role::Agent, Some(&deleted_sub)).await;
  let app = app!(state);

  let failed = json!({
    "id": format!("evt_{}", Uuid::new_v4().simple()),
    "type": "invoice.payment_failed",
    "data": { "object": { "id": "in_1", "subscription": failing_sub } }
  });
  let deleted = json!({
    "id": format!("evt_{}", Uuid::new_v4().simple()),
    "type": "customer.subscription.deleted",
    "data": { "object": { "id": deleted_sub, "object": "subscription" } }
  });
  assert_eq!(test::call_service(&app, webhook_request(&failed).to_request()).await.status(), StatusCode::OK);
  assert_eq!(test::call_service(&app, webhook_request(&deleted).to_request()).await.status(), StatusCode::OK);

  let status_of = |id: Uuid| {
    let pool = pool.clone();
    async move {
      sqlx::query_as::<_, (SubscriptionStatus, Option<String>)>(
        "SELECT subscription_status, stripe_subscription_id FROM users WHERE id = $1",
      )
      .bind(id)
      .fetch_one(&pool)
      .await
      .unwrap()
    }
  };
  let (status, sub) = status_of(failing_user).await;
  assert_eq!(status, SubscriptionStatus::PastDue);
  assert_eq!(sub.as_deref(), Some(failing_sub.as_str()));
  let (status, sub) = status_of(deleted_user).await;
  assert_eq!(status, SubscriptionStatus::Canceled);
  assert_eq!(sub, None);
}

#[actix_web::test]
#[serial]
async fn one_off_invoice_failure_is_acknowledged_and_kept() {
  let Some(state) = test_state().await else { return };
  let pool = state.db_pool.clone();
  let app = app!(state);
  let event_id = format!("evt_{}", Uuid::new_v4().simple());
  let event = json!({
    "id": event_id,
    "type": "invoice.payment_failed",
    "data": { "object": { "id": "in_once", "subscription": null } }
  });

  let resp = test::call_service(&app, webhook_request(&event).to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let recorded: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stripe_events WHERE id = $1)")
    .bind(&event_id)
    .fetch_one(&pool)
    .await
    .unwrap();
  assert!(recorded, "acknowledged events stay recorded so retries are skipped");
}

#[actix_web::test]
#[serial]
async fn create_listing_stops_at_the_free_quota() {
  let Some(state) = test_state().await else { return };
  let agent = insert_user(&state.db_pool, Role::Agent, None).await;
  let auth = bearer(&state, agent, Role::Agent);
  let app = app!(state);

  let first = test::TestRequest::post()
    .uri("/api/v1/listings")
    .insert_header(auth.clone())
    .set_json(listing_body(&format!("Corner Condo {}", Uuid::new_v4().simple())))
    .to_request();
  assert_eq!(test::call_service(&app, first).await.status(), StatusCode::CREATED);

  let second = test::TestRequest::post()
    .uri("/api/v1/listings")
    .insert_header(auth)
    .set_json(listing_body(&format!("Second Condo {}", Uuid::new_v4().simple())))
    .to_request();
  let resp = test::call_service(&app, second).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["used"], 1);
  assert_eq!(body["limit"], 1);
}

#[actix_web::test]
#[serial]
async fn registration_stores_user_and_verification_token() {
  let Some(state) = test_state().await else { return };
  let pool = state.db_pool.clone();
  let app = app!(state);
  let email = format!("{}@haven.test", Uuid::new_v4().simple());

  let req = test::TestRequest::post()
    .uri("/api/v1/auth/register")
    .set_json(json!({ "email": email, "password": "long-enough-pw", "name": "New Agent", "role": "AGENT" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

  let tokens: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM email_verifications v JOIN users u ON u.id = v.user_id WHERE u.email = $1",
  )
  .bind(&email)
  .fetch_one(&pool)
  .await
  .unwrap();
  assert_eq!(tokens, 1);
}

#[actix_web::test]
#[serial]
async fn favorites_hide_other_owners_unpublished_listings() {
  let Some(state) = test_state().await else { return };
  let pool = state.db_pool.clone();
  let agent = insert_user(&pool, Role::Agent, None).await;
  let buyer = insert_user(&pool, Role::User, None).await;
  let visible = insert_listing(&pool, agent, "active").await;
  let hidden = insert_listing(&pool, agent, "draft").await;
  for listing_id in [visible, hidden] {
    sqlx::query("INSERT INTO favorites (user_id, listing_id) VALUES ($1, $2)")
      .bind(buyer)
      .bind(listing_id)
      .execute(&pool)
      .await
      .unwrap();
  }
  let auth = bearer(&state, buyer, Role::User);
  let app = app!(state);

  let req = test::TestRequest::get().uri("/api/v1/users/me/favorites").insert_header(auth).to_request();
  let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
  let ids: Vec<String> = body["listings"]
    .as_array()
    .unwrap()
    .iter()
    .map(|l| l["id"].as_str().unwrap().to_string())
    .collect();
  assert_eq!(ids, vec![visible.to_string()]);
}

#[actix_web::test]
#[serial]
async fn non_owner_upload_is_refused_before_the_body_is_read() {
  let Some(state) = test_state_with(|c| c.max_upload_bytes = 1024).await else { return };
  let owner = insert_user(&state.db_pool, Role::Agent, None).await;
  let stranger = insert_user(&state.db_pool, Role::Agent, None).await;
  let listing_id = insert_listing(&state.db_pool, owner, "active").await;
  let auth = bearer(&state, stranger, Role::Agent);
  let app = app!(state);

  // Oversized on purpose: buffering it first would answer 413.
  let req = test::TestRequest::post()
    .uri(&format!("/api/v1/listings/{}/images", listing_id))
    .insert_header(auth)
    .set_payload(vec![0u8; 4096])
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

fn upload_ctx(state: &AppState, owner: Uuid, listing_id: Uuid, bytes: Vec<u8>) -> FlowCtx<UploadImageCtx> {
  FlowCtx::new(UploadImageCtx {
    app_state: state.clone(),
    user_id: owner,
    listing_id,
    bytes: bytes.into(),
    alt_override: None,
    listing: None,
    processed: None,
    image_id: Uuid::new_v4(),
    storage_key: None,
    thumbnail_key: None,
    image: None,
  })
}

#[actix_web::test]
#[serial]
async fn concurrent_uploads_get_distinct_keys_and_one_primary() {
  let Some(state) = test_state().await else { return };
  let owner = insert_user(&state.db_pool, Role::Agent, None).await;
  let listing_id = insert_listing(&state.db_pool, owner, "active").await;

  let a = upload_ctx(&state, owner, listing_id, png(320, 240));
  let b = upload_ctx(&state, owner, listing_id, png(240, 320));
  let (ra, rb) = tokio::join!(state.flows.run(a.clone()), state.flows.run(b.clone()));
  ra.unwrap();
  rb.unwrap();

  let rows: Vec<(String, i32, bool)> =
    sqlx::query_as("SELECT storage_key, position, is_primary FROM listing_images WHERE listing_id = $1 ORDER BY position")
      .bind(listing_id)
      .fetch_all(&state.db_pool)
      .await
      .unwrap();
  assert_eq!(rows.len(), 2);
  assert_ne!(rows[0].0, rows[1].0);
  assert_eq!((rows[0].1, rows[1].1), (0, 1));
  assert_eq!(rows.iter().filter(|r| r.2).count(), 1);
}
