// haven/server/src/models/listing.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
  House,
  Condo,
  Townhouse,
  Apartment,
  Land,
  Commercial,
}

impl PropertyType {
  pub fn as_str(&self) -> &'static str {
    match self {
      PropertyType::House => "house",
      PropertyType::Condo => "condo",
      PropertyType::Townhouse => "townhouse",
      PropertyType::Apartment => "apartment",
      PropertyType::Land => "land",
      PropertyType::Commercial => "commercial",
    }
  }

  /// schema.org type used in structured data.
  pub fn schema_type(&self) -> &'static str {
    match self {
      PropertyType::House | PropertyType::Townhouse => "SingleFamilyResidence",
      PropertyType::Condo | PropertyType::Apartment => "Apartment",
      PropertyType::Land => "Landform",
      PropertyType::Commercial => "Place",
    }
  }
}

impl fmt::Display for PropertyType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PropertyType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "house" => Ok(PropertyType::House),
      "condo" => Ok(PropertyType::Condo),
      "townhouse" => Ok(PropertyType::Townhouse),
      "apartment" => Ok(PropertyType::Apartment),
      "land" => Ok(PropertyType::Land),
      "commercial" => Ok(PropertyType::Commercial),
      other => Err(format!("Unknown property type '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "listing_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
  Sale,
  Rent,
}

impl ListingType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ListingType::Sale => "sale",
      ListingType::Rent => "rent",
    }
  }
}

impl FromStr for ListingType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "sale" | "buy" => Ok(ListingType::Sale),
      "rent" | "lease" => Ok(ListingType::Rent),
      other => Err(format!("Unknown listing type '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "listing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
  Draft,
  Active,
  Pending,
  Sold,
  Archived,
}

impl ListingStatus {
  /// Archived listings no longer count against the owner's quota.
  pub fn counts_toward_quota(&self) -> bool {
    !matches!(self, ListingStatus::Archived)
  }

  /// Statuses anyone may see; drafts and archived listings are owner-only.
  pub fn is_public(&self) -> bool {
    matches!(self, ListingStatus::Active | ListingStatus::Pending | ListingStatus::Sold)
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Listing {
  pub id: Uuid,
  pub owner_id: Uuid,
  pub title: String,
  pub slug: String,
  pub description: String,
  pub property_type: PropertyType,
  pub listing_type: ListingType,
  pub status: ListingStatus,
  pub price_cents: i64,
  pub bedrooms: Option<i32>,
  pub bathrooms: Option<f32>,
  pub square_feet: Option<i32>,
  pub year_built: Option<i32>,
  pub address_line: String,
  pub city: String,
  pub state: String,
  pub postal_code: Option<String>,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  pub features: Vec<String>,
  pub meta_description: String,
  pub is_featured: bool,
  pub view_count: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Filters accepted by the public search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingSearch {
  pub city: Option<String>,
  pub state: Option<String>,
  pub listing_type: Option<ListingType>,
  pub property_type: Option<PropertyType>,
  pub min_price: Option<i64>,
  pub max_price: Option<i64>,
  pub min_beds: Option<i32>,
  pub q: Option<String>,
  pub page: Option<i64>,
  pub per_page: Option<i64>,
}

impl ListingSearch {
  pub const MAX_PER_PAGE: i64 = 50;
  pub const MAX_PAGE: i64 = 10_000;

  /// `(limit, offset)` with page numbers starting at 1.
  pub fn paging(&self) -> (i64, i64) {
    let per_page = self.per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE);
    let page = self.page.unwrap_or(1).clamp(1, Self::MAX_PAGE);
    (per_page, (page - 1).saturating_mul(per_page))
  }
}

impl Listing {
  pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
      .bind(id)
      .fetch_optional(pool)
      .await
  }

  pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE slug = $1")
      .bind(slug)
      .fetch_optional(pool)
      .await
  }

  pub async fn slug_taken(pool: &PgPool, slug: &str, except: Option<Uuid>) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM listings WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))")
      .bind(slug)
      .bind(except)
      .fetch_one(pool)
      .await
  }

  /// Listings that count against the owner's package cap.
  pub async fn count_for_quota(pool: &PgPool, owner_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings WHERE owner_id = $1 AND status <> 'archived'")
      .bind(owner_id)
      .fetch_one(pool)
      .await
  }

  pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid, only_active: bool) -> Result<Vec<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>(
      "SELECT * FROM listings WHERE owner_id = $1 AND (NOT $2 OR status = 'active') ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .bind(only_active)
    .fetch_all(pool)
    .await
  }

  /// Favourited listings the user may still see: public ones plus their own.
  pub async fn favorites_of(pool: &PgPool, user_id: Uuid) -> Result<Vec<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>(
      "SELECT l.* FROM listings l
       JOIN favorites f ON f.listing_id = l.id
       WHERE f.user_id = $1
         AND (l.status IN ('active', 'pending', 'sold') OR l.owner_id = $1)
       ORDER BY f.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
  }

  pub async fn search(pool: &PgPool, filter: &ListingSearch) -> Result<Vec<Listing>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM listings WHERE status = 'active'");
    if let Some(city) = filter.city.as_deref().filter(|c| !c.trim().is_empty()) {
      qb.push(" AND lower(city) = lower(").push_bind(city.trim().to_string()).push(")");
    }
    if let Some(state) = filter.state.as_deref().filter(|s| !s.trim().is_empty()) {
      qb.push(" AND lower(state) = lower(").push_bind(state.trim().to_string()).push(")");
    }
    if let Some(listing_type) = filter.listing_type {
      qb.push(" AND listing_type = ").push_bind(listing_type);
    }
    if let Some(property_type) = filter.property_type {
      qb.push(" AND property_type = ").push_bind(property_type);
    }
    if let Some(min) = filter.min_price {
      qb.push(" AND price_cents >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
      qb.push(" AND price_cents <= ").push_bind(max);
    }
    if let Some(beds) = filter.min_beds {
      qb.push(" AND bedrooms >= ").push_bind(beds);
    }
    if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
      let pattern = format!("%{}%", q.trim().replace('%', "\\%").replace('_', "\\_"));
      qb.push(" AND (title ILIKE ").push_bind(pattern.clone()).push(" OR description ILIKE ").push_bind(pattern).push(")");
    }

    let (limit, offset) = filter.paging();
    qb.push(" ORDER BY is_featured DESC, created_at DESC LIMIT ")
      .push_bind(limit)
      .push(" OFFSET ")
      .push_bind(offset);

    qb.build_query_as::<Listing>().fetch_all(pool).await
  }

  pub async fn record_view(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE listings SET view_count = view_count + 1 WHERE id = $1")
      .bind(id)
      .execute(pool)
      .await?;
    Ok(())
  }
}
