//! Cache backend: one read/write surface over the three storage mediums.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::response::{CachedResponse, ResponseStore};
use super::storage::{KeyValueStore, MemoryStore};

/// Which storage medium a fetch controller saves into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingMethod {
  /// Process-scoped key-value store
  Session,
  /// Key-value store that survives restarts
  #[serde(alias = "local")]
  Persistent,
  /// Request/response cache store
  #[default]
  #[serde(alias = "cache")]
  ResponseCache,
}

impl fmt::Display for SavingMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Session => "session",
      Self::Persistent => "persistent",
      Self::ResponseCache => "response_cache",
    };
    f.write_str(name)
  }
}

/// The process-wide storage mediums available to fetch controllers.
///
/// Every controller built from the same environment shares the same stores,
/// so two controllers fetching the same URL see each other's entries.
#[derive(Clone)]
pub struct StorageEnv {
  pub session: Arc<dyn KeyValueStore>,
  pub persistent: Option<Arc<dyn KeyValueStore>>,
  pub response_cache: Option<Arc<dyn ResponseStore>>,
}

impl StorageEnv {
  /// An environment with only the session store available.
  pub fn session_only() -> Self {
    Self {
      session: Arc::new(MemoryStore::new()),
      persistent: None,
      response_cache: None,
    }
  }

  pub fn with_persistent(mut self, store: Arc<dyn KeyValueStore>) -> Self {
    self.persistent = Some(store);
    self
  }

  pub fn with_response_cache(mut self, store: Arc<dyn ResponseStore>) -> Self {
    self.response_cache = Some(store);
    self
  }
}

impl Default for StorageEnv {
  fn default() -> Self {
    Self::session_only()
  }
}

impl fmt::Debug for StorageEnv {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StorageEnv")
      .field("persistent", &self.persistent.is_some())
      .field("response_cache", &self.response_cache.is_some())
      .finish_non_exhaustive()
  }
}

/// Cache backend selected once at construction.
///
/// A `None` store means the medium is unavailable in this environment: reads
/// miss and writes are dropped, so fetching degrades to uncached behavior.
#[derive(Clone)]
pub enum CacheBackend {
  Session(Arc<dyn KeyValueStore>),
  Persistent(Option<Arc<dyn KeyValueStore>>),
  ResponseCache(Option<Arc<dyn ResponseStore>>),
}

impl CacheBackend {
  /// Pick the backend for `method` out of `env`.
  pub fn select(method: SavingMethod, env: &StorageEnv) -> Self {
    match method {
      SavingMethod::Session => Self::Session(Arc::clone(&env.session)),
      SavingMethod::Persistent => Self::Persistent(env.persistent.clone()),
      SavingMethod::ResponseCache => Self::ResponseCache(env.response_cache.clone()),
    }
  }

  pub fn method(&self) -> SavingMethod {
    match self {
      Self::Session(_) => SavingMethod::Session,
      Self::Persistent(_) => SavingMethod::Persistent,
      Self::ResponseCache(_) => SavingMethod::ResponseCache,
    }
  }

  /// Whether the underlying medium exists in this environment.
  pub fn is_available(&self) -> bool {
    match self {
      Self::Session(_) => true,
      Self::Persistent(store) => store.is_some(),
      Self::ResponseCache(store) => store.is_some(),
    }
  }

  /// Read the value stored under `key`.
  ///
  /// Absent, empty, `null` and undecodable entries all come back as `None`;
  /// storage errors are logged rather than returned.
  pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let raw = match self.read_raw(key).await {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key, backend = %self.method(), error = %e, "cache read failed");
        return None;
      }
    };

    if raw.trim().is_empty() {
      debug!(key, backend = %self.method(), "empty cache entry");
      return None;
    }

    match serde_json::from_str::<Value>(&raw) {
      Ok(Value::Null) => None,
      Ok(value) => match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
          warn!(key, backend = %self.method(), error = %e, "cache entry has unexpected shape");
          None
        }
      },
      Err(e) => {
        warn!(key, backend = %self.method(), error = %e, "malformed cache entry");
        None
      }
    }
  }

  /// Store `value` under `key`. Failures are logged and swallowed.
  pub async fn write<T: Serialize>(&self, key: &str, value: &T) {
    let payload = match serde_json::to_string(value) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(key, backend = %self.method(), error = %e, "failed to serialize cache entry");
        return;
      }
    };

    if let Err(e) = self.write_raw(key, payload).await {
      warn!(key, backend = %self.method(), error = %e, "cache write failed");
    }
  }

  async fn read_raw(&self, key: &str) -> color_eyre::Result<Option<String>> {
    match self {
      Self::Session(store) | Self::Persistent(Some(store)) => store.get_item(key),
      Self::ResponseCache(Some(store)) => Ok(
        store
          .match_request(key)
          .await?
          .map(|response| response.body),
      ),
      Self::Persistent(None) | Self::ResponseCache(None) => Ok(None),
    }
  }

  async fn write_raw(&self, key: &str, payload: String) -> color_eyre::Result<()> {
    match self {
      Self::Session(store) | Self::Persistent(Some(store)) => store.set_item(key, &payload),
      Self::ResponseCache(Some(store)) => {
        store
          .put(key, CachedResponse::json(key, payload))
          .await
      }
      Self::Persistent(None) | Self::ResponseCache(None) => Ok(()),
    }
  }
}

impl fmt::Debug for CacheBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBackend")
      .field("method", &self.method())
      .field("available", &self.is_available())
      .finish()
  }
}
