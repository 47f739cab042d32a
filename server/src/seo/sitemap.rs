// haven/server/src/seo/sitemap.rs

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
pub struct SitemapEntry {
  pub slug: String,
  pub updated_at: DateTime<Utc>,
}

impl SitemapEntry {
  pub async fn active_listings(pool: &PgPool) -> Result<Vec<SitemapEntry>, sqlx::Error> {
    sqlx::query_as::<_, SitemapEntry>(
      "SELECT slug, updated_at FROM listings WHERE status = 'active' ORDER BY updated_at DESC LIMIT 50000",
    )
    .fetch_all(pool)
    .await
  }
}

fn escape_xml(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&apos;"),
      other => out.push(other),
    }
  }
  out
}

pub fn sitemap_xml(base_url: &str, entries: &[SitemapEntry]) -> String {
  let base = base_url.trim_end_matches('/');
  let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
  xml.push('\n');
  xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
  xml.push('\n');

  for path in ["/", "/listings"] {
    xml.push_str(&format!("  <url><loc>{}</loc><changefreq>daily</changefreq></url>\n", escape_xml(&format!("{}{}", base, path))));
  }
  for entry in entries {
    xml.push_str(&format!(
      "  <url><loc>{}</loc><lastmod>{}</lastmod><changefreq>weekly</changefreq></url>\n",
      escape_xml(&super::canonical_url(base, &entry.slug)),
      entry.updated_at.format("%Y-%m-%d"),
    ));
  }

  xml.push_str("</urlset>\n");
  xml
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn sitemap_lists_listings_with_lastmod() {
    let entries = vec![SitemapEntry {
      slug: "loft-a-b".to_string(),
      updated_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
    }];
    let xml = sitemap_xml("https://haven.example/", &entries);

    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<loc>https://haven.example/listings/loft-a-b</loc><lastmod>2024-03-09</lastmod>"));
    assert!(xml.contains("<loc>https://haven.example/</loc>"));
    assert!(xml.trim_end().ends_with("</urlset>"));
  }

  #[test]
  fn locations_are_escaped() {
    assert_eq!(escape_xml("a&b<c>"), "a&amp;b&lt;c&gt;");
  }
}
