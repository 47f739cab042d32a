// haven/server/src/pipelines/contexts.rs

//! Payloads carried through each workflow. Handlers see them wrapped in `FlowCtx`.

use crate::gating::Quota;
use crate::models::{Lead, Listing, ListingImage, ListingStatus, ListingType, Package, PropertyType, Role, User};
use crate::services::billing::{CheckoutSession, StripeEvent};
use crate::services::images::ProcessedImage;
use crate::state::AppState;
use actix_web::web::Bytes;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Clone)]
pub struct RegisterCtx {
  pub app_state: AppState,
  pub email: String,
  pub password: String,
  pub name: String,
  pub phone: Option<String>,
  pub requested_role: Option<String>,
  pub role: Role,
  pub created_user: Option<User>,
  pub verification_token: Option<String>,
  pub verification_sent: bool,
}

#[derive(Clone)]
pub struct LoginCtx {
  pub app_state: AppState,
  pub email: String,
  pub password: String,
  pub user: Option<User>,
  pub session_token: Option<String>,
}

#[derive(Clone)]
pub struct VerifyEmailCtx {
  pub app_state: AppState,
  pub token: String,
  pub user_id: Option<Uuid>,
}

/// Listing fields as submitted by a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingDraft {
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub property_type: String,
  pub listing_type: String,
  pub price_cents: i64,
  pub bedrooms: Option<i32>,
  pub bathrooms: Option<f32>,
  pub square_feet: Option<i32>,
  pub year_built: Option<i32>,
  #[serde(default)]
  pub address_line: String,
  pub city: String,
  pub state: String,
  pub postal_code: Option<String>,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  #[serde(default)]
  pub features: Vec<String>,
  pub status: Option<ListingStatus>,
}

/// A draft that passed validation, with parsed enum fields.
#[derive(Debug, Clone)]
pub struct ValidListing {
  pub draft: ListingDraft,
  pub property_type: PropertyType,
  pub listing_type: ListingType,
  pub status: ListingStatus,
}

#[derive(Clone)]
pub struct CreateListingCtx {
  pub app_state: AppState,
  pub owner_id: Uuid,
  pub draft: ListingDraft,
  pub validated: Option<ValidListing>,
  pub owner: Option<User>,
  pub package: Option<Package>,
  pub quota: Option<Quota>,
  pub slug: Option<String>,
  pub meta_description: Option<String>,
  pub listing: Option<Listing>,
}

#[derive(Clone)]
pub struct UploadImageCtx {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub listing_id: Uuid,
  pub bytes: Bytes,
  pub alt_override: Option<String>,
  pub listing: Option<Listing>,
  pub processed: Option<ProcessedImage>,
  pub image_id: Uuid,
  pub storage_key: Option<String>,
  pub thumbnail_key: Option<String>,
  pub image: Option<ListingImage>,
}

#[derive(Clone)]
pub struct CheckoutCtx {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub package_id: Uuid,
  pub upgrade: bool,
  pub user: Option<User>,
  pub current_package: Option<Package>,
  pub target_package: Option<Package>,
  pub session: Option<CheckoutSession>,
}

#[derive(Clone)]
pub struct StripeWebhookCtx {
  pub app_state: AppState,
  pub payload: Bytes,
  pub signature: Option<String>,
  pub event: Option<StripeEvent>,
  pub recorded: bool,
  pub duplicate: bool,
}

impl StripeWebhookCtx {
  pub fn event_type(&self) -> &str {
    self.event.as_ref().map(|e| e.event_type.as_str()).unwrap_or_default()
  }
}

/// `checkout.session.completed`: attach the purchased package.
#[derive(Clone)]
pub struct CheckoutCompletedCtx {
  pub app_state: AppState,
  pub user_id: Option<Uuid>,
  pub package_id: Option<Uuid>,
  pub customer_id: Option<String>,
  pub subscription_id: Option<String>,
  pub user: Option<User>,
  pub package: Option<Package>,
}

/// `customer.subscription.deleted` and `invoice.payment_failed`.
#[derive(Clone)]
pub struct SubscriptionEventCtx {
  pub app_state: AppState,
  pub event_type: String,
  /// `None` for one-off invoices that belong to no subscription.
  pub subscription_id: Option<String>,
  pub affected_users: u64,
}

#[derive(Clone)]
pub struct SubmitLeadCtx {
  pub app_state: AppState,
  pub listing_id: Uuid,
  pub sender_id: Option<Uuid>,
  pub name: String,
  pub email: String,
  pub phone: Option<String>,
  pub message: String,
  pub listing: Option<Listing>,
  pub agent: Option<User>,
  pub lead: Option<Lead>,
  pub conversation_id: Option<Uuid>,
  pub agent_notified: bool,
}
