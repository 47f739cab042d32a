// haven/server/src/services/mod.rs

pub mod auth;
pub mod billing;
pub mod images;
pub mod mailer;
pub mod storage;

pub use auth::{SessionClaims, SessionTokens};
pub use billing::{BillingGateway, CheckoutRequest, CheckoutSession, MockGateway, StripeGateway};
pub use images::ImageProcessor;
pub use mailer::Mailer;
pub use storage::{LocalObjectStore, ObjectStore};
