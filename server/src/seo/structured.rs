// haven/server/src/seo/structured.rs

use crate::models::{Listing, ListingImage, ListingStatus, ListingType};
use serde_json::{json, Map, Value};

pub fn canonical_url(base_url: &str, slug: &str) -> String {
  format!("{}/listings/{}", base_url.trim_end_matches('/'), slug)
}

/// schema.org `RealEstateListing` JSON-LD for a listing detail page.
pub fn structured_data(listing: &Listing, images: &[ListingImage], base_url: &str) -> Value {
  let availability = match listing.status {
    ListingStatus::Sold | ListingStatus::Archived => "https://schema.org/SoldOut",
    ListingStatus::Pending => "https://schema.org/LimitedAvailability",
    _ => "https://schema.org/InStock",
  };
  let business_function = match listing.listing_type {
    ListingType::Sale => "http://purl.org/goodrelations/v1#Sell",
    ListingType::Rent => "http://purl.org/goodrelations/v1#LeaseOut",
  };

  let mut address = Map::new();
  address.insert("@type".into(), json!("PostalAddress"));
  if !listing.address_line.is_empty() {
    address.insert("streetAddress".into(), json!(listing.address_line));
  }
  address.insert("addressLocality".into(), json!(listing.city));
  address.insert("addressRegion".into(), json!(listing.state));
  if let Some(postal_code) = &listing.postal_code {
    address.insert("postalCode".into(), json!(postal_code));
  }

  let mut item = Map::new();
  item.insert("@type".into(), json!(listing.property_type.schema_type()));
  item.insert("address".into(), Value::Object(address.clone()));
  if let Some(rooms) = listing.bedrooms {
    item.insert("numberOfRooms".into(), json!(rooms));
  }
  if let Some(baths) = listing.bathrooms {
    item.insert("numberOfBathroomsTotal".into(), json!(baths));
  }
  if let Some(sqft) = listing.square_feet {
    item.insert(
      "floorSize".into(),
      json!({ "@type": "QuantitativeValue", "value": sqft, "unitCode": "FTK" }),
    );
  }
  if let Some(year) = listing.year_built {
    item.insert("yearBuilt".into(), json!(year));
  }
  if let (Some(lat), Some(lng)) = (listing.latitude, listing.longitude) {
    item.insert("geo".into(), json!({ "@type": "GeoCoordinates", "latitude": lat, "longitude": lng }));
  }

  let url = canonical_url(base_url, &listing.slug);
  let image_urls: Vec<&str> = images.iter().map(|img| img.url.as_str()).collect();

  json!({
    "@context": "https://schema.org",
    "@type": "RealEstateListing",
    "name": listing.title,
    "description": listing.meta_description,
    "url": url,
    "datePosted": listing.created_at.date_naive().to_string(),
    "image": image_urls,
    "address": Value::Object(address),
    "offers": {
      "@type": "Offer",
      "price": listing.price_cents as f64 / 100.0,
      "priceCurrency": "USD",
      "availability": availability,
      "businessFunction": business_function,
      "url": url,
      "itemOffered": Value::Object(item),
    },
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seo::test_listing;

  #[test]
  fn json_ld_carries_offer_and_address() {
    let mut listing = test_listing();
    listing.square_feet = Some(1850);
    listing.postal_code = Some("78701".to_string());

    let data = structured_data(&listing, &[], "https://haven.example/");
    assert_eq!(data["@type"], "RealEstateListing");
    assert_eq!(data["url"], "https://haven.example/listings/cozy-cottage-austin-tx");
    assert_eq!(data["offers"]["price"], 450000.0);
    assert_eq!(data["offers"]["itemOffered"]["numberOfRooms"], 3);
    assert_eq!(data["offers"]["itemOffered"]["floorSize"]["value"], 1850);
    assert_eq!(data["address"]["postalCode"], "78701");
    assert!(data["image"].as_array().map(|a| a.is_empty()).unwrap_or(false));
  }

  #[test]
  fn sold_listings_are_marked_unavailable() {
    let mut listing = test_listing();
    listing.status = ListingStatus::Sold;
    let data = structured_data(&listing, &[], "https://haven.example");
    assert_eq!(data["offers"]["availability"], "https://schema.org/SoldOut");
  }
}
