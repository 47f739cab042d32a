// haven/server/src/gating.rs

//! Who may list, how many listings a package allows, and which paid features it unlocks.

use crate::errors::{AppError, Result};
use crate::models::{Package, Role, SubscriptionStatus};
use serde::Serialize;

pub const FREE_PACKAGE: &str = "Free";

const LISTING_CAPS: &[(Role, &str, i64)] = &[
  (Role::Agent, "Free", 1),
  (Role::Agent, "Basic", 10),
  (Role::Agent, "Professional", 50),
  (Role::Agent, "Premium", 200),
  (Role::Expert, "Free", 1),
  (Role::Expert, "Basic", 5),
  (Role::Expert, "Professional", 25),
  (Role::Expert, "Premium", 100),
];

fn table_cap(role: Role, package_name: &str) -> Option<i64> {
  LISTING_CAPS
    .iter()
    .find(|(r, name, _)| *r == role && name.eq_ignore_ascii_case(package_name.trim()))
    .map(|(_, _, cap)| *cap)
}

pub fn can_create_listings(role: Role) -> bool {
  matches!(role, Role::Agent | Role::Expert)
}

/// Maximum number of non-archived listings the user may hold.
pub fn listing_limit(role: Role, package: Option<&Package>, status: SubscriptionStatus) -> i64 {
  if !can_create_listings(role) {
    return 0;
  }
  let free_cap = table_cap(role, FREE_PACKAGE).unwrap_or(0);
  match package {
    Some(pkg) if pkg.is_free() => table_cap(role, &pkg.name).unwrap_or(free_cap),
    Some(pkg) if status.grants_access() => table_cap(role, &pkg.name).unwrap_or(pkg.listings_max as i64),
    _ => free_cap,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
  pub used: i64,
  pub limit: i64,
}

impl Quota {
  pub fn remaining(&self) -> i64 {
    (self.limit - self.used).max(0)
  }

  pub fn can_create(&self) -> bool {
    self.used < self.limit
  }
}

pub fn quota(role: Role, package: Option<&Package>, status: SubscriptionStatus, used: i64) -> Quota {
  Quota { used, limit: listing_limit(role, package, status) }
}

/// `Ok` when one more listing fits, otherwise `LimitReached`.
pub fn check_listing_quota(role: Role, package: Option<&Package>, status: SubscriptionStatus, used: i64) -> Result<Quota> {
  let q = quota(role, package, status, used);
  if q.can_create() {
    Ok(q)
  } else {
    Err(AppError::LimitReached { used: q.used, limit: q.limit })
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureAccess {
  pub featured_listings: bool,
  pub analytics: bool,
  pub lead_inbox: bool,
  pub expert_profile: bool,
}

pub fn feature_access(role: Role, package: Option<&Package>, status: SubscriptionStatus) -> FeatureAccess {
  let paid = match package {
    Some(pkg) if !pkg.is_free() && status.grants_access() => Some(pkg),
    _ => None,
  };
  let flag = |name: &str| paid.map(|pkg| pkg.has_feature(name)).unwrap_or(false);

  FeatureAccess {
    featured_listings: paid.map(|pkg| pkg.featured_max > 0).unwrap_or(false) || flag("featured_listings"),
    analytics: flag("analytics"),
    lead_inbox: can_create_listings(role),
    expert_profile: role == Role::Expert && (paid.is_some() || flag("expert_profile")),
  }
}

pub fn package_assignable(role: Role, package: &Package) -> bool {
  package.is_active && package.role == role
}

/// Strictly more expensive package for the same role.
pub fn is_upgrade(current: Option<&Package>, target: &Package) -> bool {
  match current {
    None => !target.is_free(),
    Some(cur) => cur.role == target.role && target.price_cents > cur.price_cents,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use uuid::Uuid;

  fn package(role: Role, name: &str, price_cents: i64, listings_max: i32) -> Package {
    Package {
      id: Uuid::new_v4(),
      name: name.to_string(),
      role,
      price_cents,
      currency: "usd".to_string(),
      billing_interval: "month".to_string(),
      listings_max,
      featured_max: 0,
      features: Vec::new(),
      stripe_price_id: None,
      is_active: true,
      sort_order: 0,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn users_cannot_list() {
    let basic = package(Role::Agent, "Basic", 2900, 10);
    assert_eq!(listing_limit(Role::User, Some(&basic), SubscriptionStatus::Active), 0);
    assert!(!can_create_listings(Role::User));
  }

  #[test]
  fn caps_follow_the_role_table() {
    let pro = package(Role::Agent, "Professional", 7900, 0);
    assert_eq!(listing_limit(Role::Agent, Some(&pro), SubscriptionStatus::Active), 50);

    let pro = package(Role::Expert, "professional", 7900, 0);
    assert_eq!(listing_limit(Role::Expert, Some(&pro), SubscriptionStatus::Active), 25);
  }

  #[test]
  fn missing_or_lapsed_package_falls_back_to_free() {
    let premium = package(Role::Agent, "Premium", 19900, 200);
    assert_eq!(listing_limit(Role::Agent, None, SubscriptionStatus::Inactive), 1);
    assert_eq!(listing_limit(Role::Agent, Some(&premium), SubscriptionStatus::Canceled), 1);
    assert_eq!(listing_limit(Role::Agent, Some(&premium), SubscriptionStatus::PastDue), 200);
  }

  #[test]
  fn unknown_package_names_use_listings_max() {
    let custom = package(Role::Agent, "Brokerage", 49900, 500);
    assert_eq!(listing_limit(Role::Agent, Some(&custom), SubscriptionStatus::Active), 500);
  }

  #[test]
  fn quota_check_reports_usage() {
    let basic = package(Role::Expert, "Basic", 1900, 5);
    assert!(check_listing_quota(Role::Expert, Some(&basic), SubscriptionStatus::Active, 4).is_ok());

    match check_listing_quota(Role::Expert, Some(&basic), SubscriptionStatus::Active, 5) {
      Err(AppError::LimitReached { used, limit }) => assert_eq!((used, limit), (5, 5)),
      other => panic!("expected LimitReached, got {:?}", other),
    }
  }

  #[test]
  fn upgrades_must_cost_more_within_role() {
    let basic = package(Role::Agent, "Basic", 2900, 10);
    let pro = package(Role::Agent, "Professional", 7900, 50);
    let expert_pro = package(Role::Expert, "Professional", 9900, 25);

    assert!(is_upgrade(Some(&basic), &pro));
    assert!(!is_upgrade(Some(&pro), &basic));
    assert!(!is_upgrade(Some(&pro), &pro));
    assert!(!is_upgrade(Some(&basic), &expert_pro));
    assert!(is_upgrade(None, &pro));
  }

  #[test]
  fn packages_are_sold_to_their_role_only() {
    let mut basic = package(Role::Agent, "Basic", 2900, 10);
    assert!(package_assignable(Role::Agent, &basic));
    assert!(!package_assignable(Role::Expert, &basic));
    basic.is_active = false;
    assert!(!package_assignable(Role::Agent, &basic));
  }

  #[test]
  fn paid_features_need_a_live_subscription() {
    let mut premium = package(Role::Expert, "Premium", 19900, 100);
    premium.features = vec!["analytics".to_string()];
    premium.featured_max = 3;

    let live = feature_access(Role::Expert, Some(&premium), SubscriptionStatus::Active);
    assert!(live.analytics && live.featured_listings && live.expert_profile && live.lead_inbox);

    let lapsed = feature_access(Role::Expert, Some(&premium), SubscriptionStatus::Canceled);
    assert!(!lapsed.analytics && !lapsed.featured_listings && !lapsed.expert_profile);
  }
}
