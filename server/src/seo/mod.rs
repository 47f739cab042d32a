// haven/server/src/seo/mod.rs

//! Slugs, meta descriptions, JSON-LD and the sitemap for public listing pages.

mod meta;
mod sitemap;
mod slug;
mod structured;

pub use meta::{extract_features, format_price, meta_description, truncate_on_word, META_DESCRIPTION_MAX};
pub use sitemap::{sitemap_xml, SitemapEntry};
pub use slug::{listing_slug_base, slugify, unique_slug, DEFAULT_MAX_LEN};
pub use structured::{canonical_url, structured_data};

use crate::models::{Listing, ListingType};

/// Descriptive alt text for the image at `position` (0-based) in a listing gallery.
pub fn image_alt_text(listing: &Listing, position: i32) -> String {
  let purpose = match listing.listing_type {
    ListingType::Sale => "for sale",
    ListingType::Rent => "for rent",
  };
  format!(
    "{} - photo {} of {} {} in {}, {}",
    listing.title,
    position + 1,
    listing.property_type.as_str(),
    purpose,
    listing.city,
    listing.state
  )
}

/// File name stem for stored images, so object keys read like the listing URL.
/// The image id keeps keys unique across concurrent uploads.
pub fn image_file_stem(slug: &str, image_id: uuid::Uuid) -> String {
  format!("{}-{}", slugify(slug, DEFAULT_MAX_LEN), image_id.simple())
}

#[cfg(test)]
pub(crate) fn test_listing() -> Listing {
  use crate::models::{ListingStatus, PropertyType};
  use chrono::Utc;
  use uuid::Uuid;

  Listing {
    id: Uuid::new_v4(),
    owner_id: Uuid::new_v4(),
    title: "Cozy Cottage".to_string(),
    slug: "cozy-cottage-austin-tx".to_string(),
    description: "Quiet street close to parks.".to_string(),
    property_type: PropertyType::House,
    listing_type: ListingType::Sale,
    status: ListingStatus::Active,
    price_cents: 45_000_000,
    bedrooms: Some(3),
    bathrooms: Some(2.0),
    square_feet: None,
    year_built: None,
    address_line: "12 Elm St".to_string(),
    city: "Austin".to_string(),
    state: "TX".to_string(),
    postal_code: None,
    latitude: None,
    longitude: None,
    features: Vec::new(),
    meta_description: String::new(),
    is_featured: false,
    view_count: 0,
    created_at: Utc::now(),
    updated_at: Utc::now(),
  }
}
