// haven/server/src/seo/slug.rs

use rand_core::{OsRng, RngCore};
use std::future::Future;

pub const DEFAULT_MAX_LEN: usize = 80;
const FALLBACK_SLUG: &str = "listing";
const MAX_NUMBERED_ATTEMPTS: u32 = 100;

/// URL-safe slug: lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(input: &str, max_len: usize) -> String {
  let mut slug = String::with_capacity(input.len());
  let mut pending_separator = false;

  for c in input.chars() {
    if c.is_ascii_alphanumeric() {
      if pending_separator && !slug.is_empty() {
        slug.push('-');
      }
      pending_separator = false;
      slug.push(c.to_ascii_lowercase());
    } else if c.is_whitespace() || matches!(c, '-' | '_' | '/') {
      pending_separator = true;
    }
  }

  if slug.len() > max_len {
    // Everything is ASCII at this point, so byte offsets are char offsets.
    let cut = match slug[..=max_len].rfind('-') {
      Some(idx) if idx > 0 => idx,
      _ => max_len,
    };
    slug.truncate(cut);
    while slug.ends_with('-') {
      slug.pop();
    }
  }

  if slug.is_empty() {
    FALLBACK_SLUG.to_string()
  } else {
    slug
  }
}

pub fn listing_slug_base(title: &str, city: &str, state: &str) -> String {
  slugify(&format!("{} {} {}", title, city, state), DEFAULT_MAX_LEN)
}

/// Finds a free slug: `base`, then `base-2` up to `base-101`, then a random suffix.
pub async fn unique_slug<F, Fut, E>(base: &str, mut is_taken: F) -> Result<String, E>
where
  F: FnMut(String) -> Fut,
  Fut: Future<Output = Result<bool, E>>,
{
  if !is_taken(base.to_string()).await? {
    return Ok(base.to_string());
  }
  for n in 2..(MAX_NUMBERED_ATTEMPTS + 2) {
    let candidate = format!("{}-{}", base, n);
    if !is_taken(candidate.clone()).await? {
      return Ok(candidate);
    }
  }
  tracing::warn!(base = %base, "Numbered slug candidates exhausted, using random suffix.");
  Ok(format!("{}-{}", base, random_suffix()))
}

fn random_suffix() -> String {
  let mut bytes = [0u8; 4];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn slugify_collapses_separators_and_strips_symbols() {
    assert_eq!(slugify("  Sunny 3BR  Loft -- Downtown!! ", 80), "sunny-3br-loft-downtown");
    assert_eq!(slugify("Main_St/Unit #4", 80), "main-st-unit-4");
    assert_eq!(slugify("Café Olé", 80), "caf-ol");
  }

  #[test]
  fn slugify_falls_back_when_nothing_survives() {
    assert_eq!(slugify("!!! ***", 80), "listing");
    assert_eq!(slugify("", 80), "listing");
  }

  #[test]
  fn slugify_truncates_on_word_boundary() {
    let slug = slugify("modern family home with pool", 15);
    assert_eq!(slug, "modern-family");
    assert!(slug.len() <= 15);

    assert_eq!(slugify("abcdefghijklmnop", 5), "abcde");
  }

  #[test]
  fn slug_base_includes_location() {
    assert_eq!(listing_slug_base("Cozy Cottage", "Austin", "TX"), "cozy-cottage-austin-tx");
  }

  #[tokio::test]
  async fn unique_slug_numbers_collisions() {
    let taken: HashSet<String> = ["home".to_string(), "home-2".to_string()].into_iter().collect();
    let slug = unique_slug("home", |candidate| {
      let hit = taken.contains(&candidate);
      async move { Ok::<_, ()>(hit) }
    })
    .await
    .unwrap();
    assert_eq!(slug, "home-3");
  }

  #[tokio::test]
  async fn unique_slug_uses_random_suffix_after_exhaustion() {
    let mut calls = 0u32;
    let slug = unique_slug("home", |_candidate| {
      calls += 1;
      async move { Ok::<_, ()>(true) }
    })
    .await
    .unwrap();
    assert_eq!(calls, 101);
    assert!(slug.starts_with("home-"));
    assert_eq!(slug.len(), "home-".len() + 8);
  }
}
