// haven/server/src/services/storage.rs

use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Where uploaded listing media lives. Keys are `/`-separated relative paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
  async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> AppResult<()>;

  /// `Ok(None)` when no object exists under `key`.
  async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

  async fn delete(&self, key: &str) -> AppResult<()>;

  fn public_url(&self, key: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
  root: PathBuf,
  public_base: String,
}

impl LocalObjectStore {
  pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
    Self {
      root: root.into(),
      public_base: public_base.trim_end_matches('/').to_string(),
    }
  }

  /// Drops empty, `.` and `..` segments so keys cannot escape the root.
  pub fn sanitize_key(key: &str) -> String {
    key
      .split(['/', '\\'])
      .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
      .collect::<Vec<_>>()
      .join("/")
  }

  fn path_for(&self, key: &str) -> AppResult<PathBuf> {
    let clean = Self::sanitize_key(key);
    if clean.is_empty() {
      return Err(AppError::Validation(format!("Invalid storage key '{}'", key)));
    }
    Ok(clean.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
  }

  async fn ensure_parent(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", parent.display(), e)))?;
    }
    Ok(())
  }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
  #[instrument(name = "storage::put", skip(self, bytes), fields(size = bytes.len()))]
  async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> AppResult<()> {
    let path = self.path_for(key)?;
    Self::ensure_parent(&path).await?;
    fs::write(&path, bytes)
      .await
      .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;
    debug!(path = %path.display(), "Object stored.");
    Ok(())
  }

  async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
    let path = self.path_for(key)?;
    match fs::read(&path).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(AppError::Storage(format!("Failed to read {}: {}", path.display(), e))),
    }
  }

  #[instrument(name = "storage::delete", skip(self))]
  async fn delete(&self, key: &str) -> AppResult<()> {
    let path = self.path_for(key)?;
    match fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(AppError::Storage(format!("Failed to delete {}: {}", path.display(), e))),
    }
  }

  fn public_url(&self, key: &str) -> String {
    format!("{}/{}", self.public_base, Self::sanitize_key(key))
  }
}

/// Content type inferred from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
  match key.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()).as_deref() {
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("png") => "image/png",
    Some("webp") => "image/webp",
    Some("xml") => "application/xml",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_store() -> LocalObjectStore {
    let root = std::env::temp_dir().join(format!("haven-store-{}", uuid::Uuid::new_v4()));
    LocalObjectStore::new(root, "http://localhost/uploads/")
  }

  #[test]
  fn keys_cannot_escape_root() {
    assert_eq!(LocalObjectStore::sanitize_key("../../etc/passwd"), "etc/passwd");
    assert_eq!(LocalObjectStore::sanitize_key("/listings//a/./b.jpg"), "listings/a/b.jpg");
    assert_eq!(LocalObjectStore::sanitize_key("..\\secret"), "secret");
  }

  #[tokio::test]
  async fn put_get_delete() {
    let store = temp_store();
    store.put("listings/1/a.jpg", b"jpeg-bytes", "image/jpeg").await.unwrap();
    assert_eq!(store.get("listings/1/a.jpg").await.unwrap().as_deref(), Some(&b"jpeg-bytes"[..]));

    store.delete("listings/1/a.jpg").await.unwrap();
    assert!(store.get("listings/1/a.jpg").await.unwrap().is_none());
    store.delete("listings/1/a.jpg").await.unwrap();
  }

  #[test]
  fn public_urls_use_clean_keys() {
    let store = temp_store();
    assert_eq!(store.public_url("/listings/1/a.jpg"), "http://localhost/uploads/listings/1/a.jpg");
  }

  #[test]
  fn empty_keys_are_rejected() {
    let store = temp_store();
    assert!(store.path_for("../..").is_err());
  }

  #[test]
  fn content_types_follow_extension() {
    assert_eq!(content_type_for("a/b.JPG"), "image/jpeg");
    assert_eq!(content_type_for("noext"), "application/octet-stream");
  }
}
