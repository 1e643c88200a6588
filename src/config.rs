use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
  DiskResponseCache, SavingMethod, SqliteStore, StorageEnv, DEFAULT_CACHE_NAME,
};
use crate::client::HttpFetcher;
use crate::pagination::PageOptions;
use crate::query::FetchOptions;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub source: SourceConfig,
  #[serde(default)]
  pub fetch: FetchOptions,
  #[serde(default)]
  pub pagination: PageOptions,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  /// URL with `{limit}`, `{skip}` and `{page}` placeholders
  pub url_template: String,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      url_template: "https://cataas.com/api/cats?limit={limit}&skip={skip}".to_string(),
    }
  }
}

impl SourceConfig {
  /// Fill in the template for a zero-based page index.
  pub fn build_url(&self, page: usize, items_per_page: usize) -> String {
    expand_template(&self.url_template, page, items_per_page)
  }
}

/// Replace `{limit}`, `{skip}` and `{page}` in `template`.
///
/// Page options are validated so the offset fits; it saturates otherwise.
pub fn expand_template(template: &str, page: usize, items_per_page: usize) -> String {
  template
    .replace("{limit}", &items_per_page.to_string())
    .replace("{skip}", &page.saturating_mul(items_per_page).to_string())
    .replace("{page}", &page.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file for the persistent store (default: data dir)
  pub sqlite_path: Option<PathBuf>,
  /// Directory for the response cache (default: cache dir)
  pub response_cache_dir: Option<PathBuf>,
}

impl StorageConfig {
  /// Open the storage mediums needed for `method`.
  ///
  /// Only the selected medium is opened; the others stay unavailable.
  pub fn open_env(&self, method: SavingMethod) -> Result<StorageEnv> {
    let env = StorageEnv::session_only();

    let env = match method {
      SavingMethod::Session => env,
      SavingMethod::Persistent => {
        let store = match &self.sqlite_path {
          Some(path) => SqliteStore::open_at(path)?,
          None => SqliteStore::open()?,
        };
        env.with_persistent(Arc::new(store))
      }
      SavingMethod::ResponseCache => {
        let cache = match &self.response_cache_dir {
          Some(dir) => DiskResponseCache::open_at(dir)?,
          None => DiskResponseCache::open(DEFAULT_CACHE_NAME)?,
        };
        env.with_response_cache(Arc::new(cache))
      }
    };

    Ok(env)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  pub timeout_secs: u64,
  pub user_agent: String,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_secs: 30,
      user_agent: concat!("pagefetch/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

impl HttpConfig {
  pub fn fetcher(&self) -> Result<HttpFetcher> {
    HttpFetcher::with_settings(Duration::from_secs(self.timeout_secs), &self.user_agent)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pagefetch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pagefetch/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pagefetch.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pagefetch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config
      .pagination
      .validate()
      .map_err(|e| eyre!("Invalid pagination settings: {}", e))?;
    Ok(config)
  }
}
