// haven/server/src/seo/meta.rs

use crate::models::{Listing, ListingType};
use once_cell::sync::Lazy;
use regex::Regex;

pub const META_DESCRIPTION_MAX: usize = 160;

static FEATURE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
  [
    ("pool", r"(?i)\b(swimming\s+)?pool\b"),
    ("garage", r"(?i)\bgarage\b"),
    ("fireplace", r"(?i)\bfire\s?place\b"),
    ("waterfront", r"(?i)\b(waterfront|lakefront|beachfront|oceanfront)\b"),
    ("views", r"(?i)\b(ocean|lake|city|mountain|river)?\s*views?\b"),
    ("renovated", r"(?i)\b(renovated|remodel(l)?ed|updated)\b"),
    ("hardwood floors", r"(?i)\bhardwood\b"),
    ("garden", r"(?i)\b(garden|landscaped\s+yard)\b"),
    ("basement", r"(?i)\bbasement\b"),
    ("balcony", r"(?i)\b(balcony|terrace)\b"),
  ]
  .into_iter()
  .map(|(label, pattern)| (label, Regex::new(pattern).expect("valid feature regex")))
  .collect()
});

static BEDROOMS: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*(?:-\s*)?(?:bed(?:room)?s?|br)\b").expect("valid bedroom regex"));
static BATHROOMS: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)\b(\d{1,2}(?:\.5)?)\s*(?:-\s*)?(?:bath(?:room)?s?|ba)\b").expect("valid bathroom regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Feature labels mentioned in free-form description text, in a stable order.
pub fn extract_features(description: &str) -> Vec<&'static str> {
  FEATURE_PATTERNS
    .iter()
    .filter(|(_, re)| re.is_match(description))
    .map(|(label, _)| *label)
    .collect()
}

fn bedrooms_from_text(description: &str) -> Option<String> {
  BEDROOMS.captures(description).map(|c| c[1].to_string())
}

fn bathrooms_from_text(description: &str) -> Option<String> {
  BATHROOMS.captures(description).map(|c| c[1].to_string())
}

fn format_bathrooms(baths: f32) -> String {
  if baths.fract() == 0.0 {
    format!("{:.0}", baths)
  } else {
    format!("{:.1}", baths)
  }
}

/// `$1,250,000` for sales, `$2,400/mo` for rentals.
pub fn format_price(price_cents: i64, listing_type: ListingType) -> String {
  let dollars = (price_cents / 100).to_string();
  let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
  for (i, c) in dollars.chars().enumerate() {
    if i > 0 && (dollars.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  match listing_type {
    ListingType::Sale => format!("${}", grouped),
    ListingType::Rent => format!("${}/mo", grouped),
  }
}

pub fn collapse_whitespace(text: &str) -> String {
  WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Cuts at the last word boundary that leaves room for a trailing ellipsis.
pub fn truncate_on_word(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    return text.to_string();
  }
  let budget = max_chars.saturating_sub(1);
  let byte_end = text.char_indices().nth(budget).map(|(i, _)| i).unwrap_or(text.len());
  let head = &text[..byte_end];
  let cut = match head.rfind(' ') {
    Some(idx) if idx > 0 => &head[..idx],
    _ => head,
  };
  format!("{}…", cut.trim_end_matches(|c: char| c == ',' || c == '.' || c.is_whitespace()))
}

/// Search-result snippet built from the structured fields plus whatever the description reveals.
pub fn meta_description(listing: &Listing) -> String {
  let beds = listing
    .bedrooms
    .map(|b| b.to_string())
    .or_else(|| bedrooms_from_text(&listing.description));
  let baths = listing
    .bathrooms
    .map(format_bathrooms)
    .or_else(|| bathrooms_from_text(&listing.description));

  let mut rooms = Vec::new();
  if let Some(b) = beds {
    rooms.push(format!("{} bed", b));
  }
  if let Some(b) = baths {
    rooms.push(format!("{} bath", b));
  }

  let kind = match listing.listing_type {
    ListingType::Sale => "sale",
    ListingType::Rent => "rent",
  };
  let headline = if rooms.is_empty() {
    let property = listing.property_type.as_str();
    let mut chars = property.chars();
    let capitalized = match chars.next() {
      Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
      None => String::new(),
    };
    format!("{} for {} in {}, {}.", capitalized, kind, listing.city, listing.state)
  } else {
    format!(
      "{} {} for {} in {}, {}.",
      rooms.join(", "),
      listing.property_type.as_str(),
      kind,
      listing.city,
      listing.state
    )
  };

  let mut parts = vec![headline, format!("{}.", format_price(listing.price_cents, listing.listing_type))];

  let features = extract_features(&listing.description);
  if !features.is_empty() {
    parts.push(format!("Features: {}.", features.join(", ")));
  }

  let lead = collapse_whitespace(&listing.description);
  if !lead.is_empty() {
    parts.push(lead);
  }

  truncate_on_word(&collapse_whitespace(&parts.join(" ")), META_DESCRIPTION_MAX)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seo::test_listing;

  #[test]
  fn price_is_grouped_by_thousands() {
    assert_eq!(format_price(125_000_000, ListingType::Sale), "$1,250,000");
    assert_eq!(format_price(240_000, ListingType::Rent), "$2,400/mo");
    assert_eq!(format_price(50_000, ListingType::Sale), "$500");
  }

  #[test]
  fn features_are_detected_from_text() {
    let found = extract_features("Renovated kitchen, heated POOL and a two-car garage.");
    assert_eq!(found, vec!["pool", "garage", "renovated"]);
  }

  #[test]
  fn structured_rooms_take_precedence() {
    let mut listing = test_listing();
    listing.bedrooms = Some(3);
    listing.bathrooms = Some(2.5);
    listing.description = "Charming 5 bedroom home with a fireplace.".to_string();

    let meta = meta_description(&listing);
    assert!(meta.starts_with("3 bed, 2.5 bath house for sale in Austin, TX. $450,000."), "{}", meta);
    assert!(meta.contains("Features: fireplace."));
  }

  #[test]
  fn rooms_fall_back_to_description() {
    let mut listing = test_listing();
    listing.bedrooms = None;
    listing.bathrooms = None;
    listing.description = "Bright 2br / 1 bath unit.".to_string();

    let meta = meta_description(&listing);
    assert!(meta.starts_with("2 bed, 1 bath house"), "{}", meta);
  }

  #[test]
  fn headline_without_rooms_is_capitalized() {
    let mut listing = test_listing();
    listing.bedrooms = None;
    listing.bathrooms = None;
    listing.description = String::new();

    assert_eq!(meta_description(&listing), "House for sale in Austin, TX. $450,000.");
  }

  #[test]
  fn long_descriptions_are_cut_at_a_word() {
    let mut listing = test_listing();
    listing.description = "spacious ".repeat(60);

    let meta = meta_description(&listing);
    assert!(meta.chars().count() <= META_DESCRIPTION_MAX);
    assert!(meta.ends_with('…'));
    assert!(!meta.contains("  "));
  }
}
