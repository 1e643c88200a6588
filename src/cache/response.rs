//! Request/response cache store, keyed by request URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the cache the controller opens by default.
pub const DEFAULT_CACHE_NAME: &str = "pagefetch-cache";

/// A stored response for a request URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
  pub url: String,
  pub content_type: String,
  pub body: String,
  pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
  /// A JSON response for `url` stamped with the current time.
  pub fn json(url: &str, body: String) -> Self {
    Self {
      url: url.to_string(),
      content_type: "application/json".to_string(),
      body,
      stored_at: Utc::now(),
    }
  }
}

/// Asynchronous request/response store.
#[async_trait]
pub trait ResponseStore: Send + Sync {
  /// Find the stored response for a request to `url`.
  async fn match_request(&self, url: &str) -> Result<Option<CachedResponse>>;

  /// Store `response` for requests to `url`, replacing any previous entry.
  async fn put(&self, url: &str, response: CachedResponse) -> Result<()>;
}

/// Named response cache kept as one file per request URL.
#[derive(Debug, Clone)]
pub struct DiskResponseCache {
  dir: PathBuf,
}

impl DiskResponseCache {
  /// Open the named cache under the platform cache directory.
  pub fn open(name: &str) -> Result<Self> {
    let base = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| eyre!("Could not determine cache directory"))?;

    Self::open_at(&base.join("pagefetch").join(name))
  }

  /// Open the cache rooted at `dir`, creating it if needed.
  pub fn open_at(dir: &Path) -> Result<Self> {
    std::fs::create_dir_all(dir)
      .map_err(|e| eyre!("Failed to create response cache {}: {}", dir.display(), e))?;

    info!(dir = %dir.display(), "opened response cache");
    Ok(Self {
      dir: dir.to_path_buf(),
    })
  }

  /// File holding the entry for `url`.
  fn entry_path(&self, url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    self
      .dir
      .join(format!("{}.json", hex::encode(hasher.finalize())))
  }
}

#[async_trait]
impl ResponseStore for DiskResponseCache {
  async fn match_request(&self, url: &str) -> Result<Option<CachedResponse>> {
    let path = self.entry_path(url);
    let raw = match tokio::fs::read(&path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(eyre!("Failed to read {}: {}", path.display(), e)),
    };

    let response: CachedResponse = serde_json::from_slice(&raw)
      .map_err(|e| eyre!("Corrupt response cache entry {}: {}", path.display(), e))?;

    // Hash collisions are not expected, but never hand back another URL's body.
    if response.url != url {
      return Ok(None);
    }

    Ok(Some(response))
  }

  async fn put(&self, url: &str, response: CachedResponse) -> Result<()> {
    let path = self.entry_path(url);
    let data =
      serde_json::to_vec(&response).map_err(|e| eyre!("Failed to serialize response: {}", e))?;

    // Write then rename so readers never see a half-written entry.
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data)
      .await
      .map_err(|e| eyre!("Failed to write {}: {}", tmp.display(), e))?;
    tokio::fs::rename(&tmp, &path)
      .await
      .map_err(|e| eyre!("Failed to store {}: {}", path.display(), e))?;

    Ok(())
  }
}
