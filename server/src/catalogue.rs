// haven/server/src/catalogue.rs

//! Default package catalogue seeded by `haven-admin seed-packages`.

use crate::models::Role;

#[derive(Debug, Clone, Copy)]
pub struct PackageSeed {
  pub role: Role,
  pub name: &'static str,
  pub price_cents: i64,
  pub listings_max: i32,
  pub featured_max: i32,
  pub features: &'static [&'static str],
  pub sort_order: i32,
}

pub const DEFAULT_PACKAGES: &[PackageSeed] = &[
  PackageSeed { role: Role::Agent, name: "Free", price_cents: 0, listings_max: 1, featured_max: 0, features: &[], sort_order: 0 },
  PackageSeed { role: Role::Agent, name: "Basic", price_cents: 2_900, listings_max: 10, featured_max: 0, features: &[], sort_order: 1 },
  PackageSeed {
    role: Role::Agent,
    name: "Professional",
    price_cents: 7_900,
    listings_max: 50,
    featured_max: 5,
    features: &["featured_listings", "analytics"],
    sort_order: 2,
  },
  PackageSeed {
    role: Role::Agent,
    name: "Premium",
    price_cents: 19_900,
    listings_max: 200,
    featured_max: 25,
    features: &["featured_listings", "analytics"],
    sort_order: 3,
  },
  PackageSeed { role: Role::Expert, name: "Free", price_cents: 0, listings_max: 1, featured_max: 0, features: &[], sort_order: 0 },
  PackageSeed {
    role: Role::Expert,
    name: "Basic",
    price_cents: 1_900,
    listings_max: 5,
    featured_max: 0,
    features: &["expert_profile"],
    sort_order: 1,
  },
  PackageSeed {
    role: Role::Expert,
    name: "Professional",
    price_cents: 4_900,
    listings_max: 25,
    featured_max: 3,
    features: &["expert_profile", "featured_listings", "analytics"],
    sort_order: 2,
  },
  PackageSeed {
    role: Role::Expert,
    name: "Premium",
    price_cents: 12_900,
    listings_max: 100,
    featured_max: 10,
    features: &["expert_profile", "featured_listings", "analytics"],
    sort_order: 3,
  },
];
