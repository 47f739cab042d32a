// haven/server/src/models/mod.rs

//! Database rows and the small queries that belong to them.

pub mod conversation;
pub mod email_verification;
pub mod favorite;
pub mod lead;
pub mod listing;
pub mod listing_image;
pub mod package;
pub mod user;

pub use conversation::{Conversation, Message};
pub use email_verification::EmailVerification;
pub use favorite::Favorite;
pub use lead::{Lead, LeadStatus};
pub use listing::{Listing, ListingSearch, ListingStatus, ListingType, PropertyType};
pub use listing_image::ListingImage;
pub use package::Package;
pub use user::{PublicProfile, Role, SubscriptionStatus, User};
