// haven/server/src/services/billing.rs

//! Stripe checkout and subscription calls behind a gateway trait, plus webhook signature checks.

use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
  pub user_id: Uuid,
  pub package_id: Uuid,
  pub package_name: String,
  pub price_id: Option<String>,
  pub customer_email: String,
  pub customer_id: Option<String>,
  pub success_url: String,
  pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
  pub id: String,
  pub url: String,
}

#[async_trait]
pub trait BillingGateway: Send + Sync {
  fn name(&self) -> &'static str;

  /// Mock gateways accept packages that carry no Stripe price.
  fn is_mock(&self) -> bool {
    false
  }

  async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession>;

  async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
  error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
  message: Option<String>,
}

pub struct StripeGateway {
  client: Client,
  api_base: String,
  secret_key: String,
}

impl StripeGateway {
  pub fn new(api_base: &str, secret_key: &str) -> AppResult<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| AppError::Config(format!("Failed to create Stripe HTTP client: {}", e)))?;
    Ok(Self {
      client,
      api_base: api_base.trim_end_matches('/').to_string(),
      secret_key: secret_key.to_string(),
    })
  }

  async fn into_result<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    if status.is_success() {
      return response
        .json::<T>()
        .await
        .map_err(|e| AppError::Billing(format!("Unexpected Stripe response: {}", e)));
    }
    let message = response
      .json::<StripeErrorBody>()
      .await
      .ok()
      .and_then(|body| body.error.message)
      .unwrap_or_else(|| format!("Stripe returned HTTP {}", status));
    warn!(%status, %message, "Stripe request failed.");
    Err(AppError::Billing(message))
  }
}

#[async_trait]
impl BillingGateway for StripeGateway {
  fn name(&self) -> &'static str {
    "stripe"
  }

  #[instrument(name = "billing::stripe_checkout", skip(self, request), fields(user_id = %request.user_id, package = %request.package_name))]
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
    let price_id = request
      .price_id
      .as_deref()
      .ok_or_else(|| AppError::Payment(format!("Package '{}' is not available for purchase.", request.package_name)))?;

    let user_id = request.user_id.to_string();
    let package_id = request.package_id.to_string();
    let mut form: Vec<(&str, &str)> = vec![
      ("mode", "subscription"),
      ("line_items[0][price]", price_id),
      ("line_items[0][quantity]", "1"),
      ("success_url", request.success_url.as_str()),
      ("cancel_url", request.cancel_url.as_str()),
      ("client_reference_id", user_id.as_str()),
      ("metadata[user_id]", user_id.as_str()),
      ("metadata[package_id]", package_id.as_str()),
      ("subscription_data[metadata][user_id]", user_id.as_str()),
      ("subscription_data[metadata][package_id]", package_id.as_str()),
    ];
    match request.customer_id.as_deref() {
      Some(customer) => form.push(("customer", customer)),
      None => form.push(("customer_email", request.customer_email.as_str())),
    }

    let response = self
      .client
      .post(format!("{}/v1/checkout/sessions", self.api_base))
      .bearer_auth(&self.secret_key)
      .form(&form)
      .send()
      .await
      .map_err(|e| AppError::Billing(format!("Stripe unreachable: {}", e)))?;
    let session: CheckoutSession = Self::into_result(response).await?;
    info!(session_id = %session.id, "Stripe checkout session created.");
    Ok(session)
  }

  #[instrument(name = "billing::stripe_cancel", skip(self))]
  async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()> {
    let response = self
      .client
      .delete(format!("{}/v1/subscriptions/{}", self.api_base, subscription_id))
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .map_err(|e| AppError::Billing(format!("Stripe unreachable: {}", e)))?;
    let _: serde_json::Value = Self::into_result(response).await?;
    info!("Stripe subscription canceled.");
    Ok(())
  }
}

/// Stand-in used when no Stripe key is configured.
#[derive(Debug, Clone)]
pub struct MockGateway {
  base_url: String,
}

impl MockGateway {
  pub fn new(base_url: &str) -> Self {
    Self { base_url: base_url.trim_end_matches('/').to_string() }
  }
}

#[async_trait]
impl BillingGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  fn is_mock(&self) -> bool {
    true
  }

  #[instrument(name = "billing::mock_checkout", skip(self, request), fields(user_id = %request.user_id, package = %request.package_name))]
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    let id = format!("cs_mock_{}", Uuid::new_v4().simple());
    info!(session_id = %id, "Simulated checkout session created.");
    Ok(CheckoutSession {
      url: format!("{}/billing/mock-checkout?session_id={}&package_id={}", self.base_url, id, request.package_id),
      id,
    })
  }

  async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()> {
    info!(%subscription_id, "Simulated subscription cancellation.");
    Ok(())
  }
}

/// Checks a `Stripe-Signature` header (`t=...,v1=...`) against the raw request body.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64, tolerance_secs: i64) -> AppResult<()> {
  let invalid = |reason: &str| AppError::Auth(format!("Invalid webhook signature: {}", reason));

  let mut timestamp: Option<i64> = None;
  let mut signatures: Vec<Vec<u8>> = Vec::new();
  for part in header.split(',') {
    match part.trim().split_once('=') {
      Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
      Some(("v1", value)) => {
        if let Ok(bytes) = hex::decode(value) {
          signatures.push(bytes);
        }
      }
      _ => {}
    }
  }

  let timestamp = timestamp.ok_or_else(|| invalid("missing timestamp"))?;
  if signatures.is_empty() {
    return Err(invalid("no v1 signature"));
  }
  let skew = now.checked_sub(timestamp).map(i64::unsigned_abs);
  if skew.map_or(true, |s| s > tolerance_secs.unsigned_abs()) {
    return Err(invalid("timestamp outside tolerance"));
  }

  let mut base = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Config(format!("Invalid webhook secret: {}", e)))?;
  base.update(timestamp.to_string().as_bytes());
  base.update(b".");
  base.update(payload);

  if signatures.iter().any(|sig| base.clone().verify_slice(sig).is_ok()) {
    Ok(())
  } else {
    Err(invalid("signature mismatch"))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
  pub id: String,
  #[serde(rename = "type")]
  pub event_type: String,
  pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
  pub object: serde_json::Value,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sign(payload: &[u8], secret: &str, t: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", t).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
  }

  #[test]
  fn valid_signature_is_accepted() {
    let payload = br#"{"id":"evt_1"}"#;
    let header = sign(payload, "whsec_test", 1_700_000_000);
    assert!(verify_webhook_signature(payload, &header, "whsec_test", 1_700_000_100, SIGNATURE_TOLERANCE_SECS).is_ok());
  }

  #[test]
  fn any_matching_v1_entry_is_enough() {
    let payload = br#"{"id":"evt_2"}"#;
    let good = sign(payload, "whsec_test", 1_700_000_000);
    let header = format!("t=1700000000,v1={},{}", "00".repeat(32), good.split(',').nth(1).unwrap());
    assert!(verify_webhook_signature(payload, &header, "whsec_test", 1_700_000_000, SIGNATURE_TOLERANCE_SECS).is_ok());
  }

  #[test]
  fn tampered_payload_or_wrong_secret_fails() {
    let header = sign(b"original", "whsec_test", 1_700_000_000);
    assert!(verify_webhook_signature(b"modified", &header, "whsec_test", 1_700_000_000, 300).is_err());
    assert!(verify_webhook_signature(b"original", &header, "whsec_other", 1_700_000_000, 300).is_err());
  }

  #[test]
  fn stale_timestamps_are_rejected() {
    let header = sign(b"body", "whsec_test", 1_700_000_000);
    let err = verify_webhook_signature(b"body", &header, "whsec_test", 1_700_000_301, 300).unwrap_err();
    assert!(err.to_string().contains("tolerance"));
  }

  #[test]
  fn extreme_timestamps_are_rejected_without_overflow() {
    for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
      let err = verify_webhook_signature(b"{}", header, "whsec", 1_700_000_000, 300).unwrap_err();
      assert!(err.to_string().contains("tolerance"), "{}", header);
    }
  }

  #[test]
  fn malformed_headers_are_rejected() {
    assert!(verify_webhook_signature(b"body", "v1=abcd", "s", 0, 300).is_err());
    assert!(verify_webhook_signature(b"body", "t=0", "s", 0, 300).is_err());
  }

  #[test]
  fn events_deserialize_type_and_object() {
    let event: StripeEvent = serde_json::from_str(
      r#"{"id":"evt_9","type":"invoice.payment_failed","data":{"object":{"subscription":"sub_1"}}}"#,
    )
    .unwrap();
    assert_eq!(event.event_type, "invoice.payment_failed");
    assert_eq!(event.data.object["subscription"], "sub_1");
  }

  #[tokio::test]
  async fn mock_gateway_issues_sessions() {
    let gateway = MockGateway::new("http://localhost:8080/");
    let request = CheckoutRequest {
      user_id: Uuid::new_v4(),
      package_id: Uuid::new_v4(),
      package_name: "Basic".to_string(),
      price_id: None,
      customer_email: "a@b.c".to_string(),
      customer_id: None,
      success_url: "http://localhost:8080/ok".to_string(),
      cancel_url: "http://localhost:8080/cancel".to_string(),
    };
    let session = gateway.create_checkout_session(&request).await.unwrap();
    assert!(session.id.starts_with("cs_mock_"));
    assert!(session.url.starts_with("http://localhost:8080/billing/mock-checkout"));
    assert!(gateway.is_mock());
  }
}
