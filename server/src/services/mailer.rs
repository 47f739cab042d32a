// haven/server/src/services/mailer.rs

use crate::errors::{AppError, Result as AppResult};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct SentEmailInfo {
  pub to: String,
  pub from: String,
  pub subject: String,
  pub body_preview: String,
  pub message_id: String,
}

/// Outbound mail. Delivery is simulated: messages are logged, not sent.
#[derive(Debug, Clone)]
pub struct Mailer {
  sender: String,
  base_url: String,
}

impl Mailer {
  pub fn new(sender: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self {
      sender: sender.into(),
      base_url: base_url.into(),
    }
  }

  pub fn sender(&self) -> &str {
    &self.sender
  }

  #[instrument(name = "mailer::send", skip(self, body), fields(from = %self.sender))]
  pub async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<SentEmailInfo> {
    if !to.contains('@') {
      return Err(AppError::Validation(format!("Cannot send mail to '{}'", to)));
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let body_preview = body.chars().take(60).collect::<String>();
    let message_id = format!("haven_mail_{}", uuid::Uuid::new_v4());
    info!(%to, %subject, %message_id, "Email dispatched.");

    Ok(SentEmailInfo {
      to: to.to_string(),
      from: self.sender.clone(),
      subject: subject.to_string(),
      body_preview,
      message_id,
    })
  }

  pub fn verification_link(&self, token: &str) -> String {
    format!("{}/verify-email?token={}", self.base_url, token)
  }

  pub async fn send_verification(&self, to: &str, name: &str, token: &str) -> AppResult<SentEmailInfo> {
    let body = format!(
      "Hi {},\n\nWelcome to Haven. Confirm your email address by opening the link below:\n\n{}\n\nThe link expires in 48 hours.",
      name,
      self.verification_link(token)
    );
    self.send(to, "Confirm your Haven account", &body).await
  }

  pub async fn send_lead_notification(
    &self,
    to: &str,
    listing_title: &str,
    lead_name: &str,
    lead_email: &str,
    message: &str,
  ) -> AppResult<SentEmailInfo> {
    let body = format!(
      "{} ({}) is interested in \"{}\":\n\n{}\n\nReply from your Haven lead inbox.",
      lead_name, lead_email, listing_title, message
    );
    self.send(to, &format!("New inquiry: {}", listing_title), &body).await
  }

  pub async fn send_subscription_activated(&self, to: &str, name: &str, package_name: &str) -> AppResult<SentEmailInfo> {
    let body = format!(
      "Hi {},\n\nYour {} plan is now active. Manage it any time from {}/account/billing.",
      name, package_name, self.base_url
    );
    self.send(to, &format!("Your {} plan is active", package_name), &body).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn verification_mail_contains_link() {
    let mailer = Mailer::new("noreply@haven.test", "https://haven.example");
    let sent = mailer.send_verification("ana@example.com", "Ana", "abc123").await.unwrap();
    assert_eq!(sent.from, "noreply@haven.test");
    assert!(sent.message_id.starts_with("haven_mail_"));
    assert_eq!(mailer.verification_link("abc123"), "https://haven.example/verify-email?token=abc123");
  }

  #[tokio::test]
  async fn rejects_malformed_recipient() {
    let mailer = Mailer::new("noreply@haven.test", "https://haven.example");
    assert!(mailer.send("nobody", "Hi", "body").await.is_err());
  }
}
