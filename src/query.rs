//! Fetch-with-cache controller.
//!
//! A `FetchQuery<T>` resolves a URL into a `T`: it looks in the configured cache
//! backend first, falls back to the network, and writes successful responses
//! back to the cache. Each `trigger()` runs as its own task and reports state
//! transitions over a channel; the owner applies them with `poll()` or waits
//! for them with `settle()`.
//!
//! # Example
//!
//! ```ignore
//! let mut query: FetchQuery<Vec<Cat>> = FetchQuery::new(fetcher, &env, FetchOptions {
//!     save: true,
//!     saving_method: SavingMethod::Persistent,
//! });
//!
//! query.trigger("https://host/api/cats?limit=2&skip=0");
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, redraw
//! }
//!
//! match query.phase() {
//!     FetchPhase::Loading => render_spinner(),
//!     FetchPhase::Success => render(query.data()),
//!     FetchPhase::Failure => render_error(query.error()),
//!     FetchPhase::Idle => {}
//! }
//! ```
//!
//! Overlapping triggers are neither cancelled nor fenced: whichever finishes
//! last overwrites the state, even if it was started first.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cache::{CacheBackend, SavingMethod, StorageEnv};
use crate::client::JsonFetcher;
use crate::error::FetchError;

/// Where a fetch controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
  /// Nothing has resolved yet
  Idle,
  /// A network request is in flight
  Loading,
  /// The most recent result was data
  Success,
  /// The most recent result was an error
  Failure,
}

/// Where the current data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
  Network,
  Cache,
}

/// Observable state of a fetch controller.
///
/// After a failure `data` still holds the last successful value.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
  pub data: Option<T>,
  pub loading: bool,
  pub error: Option<FetchError>,
  pub phase: FetchPhase,
  pub source: Option<DataSource>,
}

impl<T> Default for FetchState<T> {
  fn default() -> Self {
    Self {
      data: None,
      loading: false,
      error: None,
      phase: FetchPhase::Idle,
      source: None,
    }
  }
}

/// Caching options, fixed for the lifetime of a controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
  /// Read from and write to the cache backend
  pub save: bool,
  /// Which backend to use when `save` is set
  pub saving_method: SavingMethod,
}

/// A state change reported by a trigger task.
#[derive(Debug)]
enum Transition<T> {
  Loading {
    generation: u64,
  },
  Success {
    generation: u64,
    data: T,
    source: DataSource,
  },
  Failure {
    generation: u64,
    error: FetchError,
  },
}

/// Reports a trigger's outcome, falling back to `Cancelled` if the task is
/// dropped before it finishes.
struct Reporter<T> {
  tx: mpsc::UnboundedSender<Transition<T>>,
  generation: u64,
  finished: bool,
}

impl<T> Reporter<T> {
  fn loading(&self) {
    let _ = self.tx.send(Transition::Loading {
      generation: self.generation,
    });
  }

  fn success(mut self, data: T, source: DataSource) {
    self.finished = true;
    let _ = self.tx.send(Transition::Success {
      generation: self.generation,
      data,
      source,
    });
  }

  fn failure(mut self, error: FetchError) {
    self.finished = true;
    let _ = self.tx.send(Transition::Failure {
      generation: self.generation,
      error,
    });
  }
}

impl<T> Drop for Reporter<T> {
  fn drop(&mut self) {
    if !self.finished {
      let _ = self.tx.send(Transition::Failure {
        generation: self.generation,
        error: FetchError::Cancelled,
      });
    }
  }
}

/// Fetch-with-cache controller for a single logical resource.
pub struct FetchQuery<T> {
  state: FetchState<T>,
  options: FetchOptions,
  /// `None` when caching is disabled
  backend: Option<CacheBackend>,
  fetcher: Arc<dyn JsonFetcher>,
  tx: mpsc::UnboundedSender<Transition<T>>,
  rx: mpsc::UnboundedReceiver<Transition<T>>,
  url: Option<String>,
  next_generation: u64,
  newest_settled: Option<u64>,
  in_flight: usize,
  /// Generations whose network request has started and not yet finished
  network_pending: HashSet<u64>,
}

impl<T> FetchQuery<T>
where
  T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
  /// Create an idle controller. Nothing is fetched until `trigger()`.
  pub fn new(fetcher: Arc<dyn JsonFetcher>, env: &StorageEnv, options: FetchOptions) -> Self {
    let backend = options
      .save
      .then(|| CacheBackend::select(options.saving_method, env));
    let (tx, rx) = mpsc::unbounded_channel();

    Self {
      state: FetchState::default(),
      options,
      backend,
      fetcher,
      tx,
      rx,
      url: None,
      next_generation: 0,
      newest_settled: None,
      in_flight: 0,
      network_pending: HashSet::new(),
    }
  }

  /// Resolve `url`: cache first when enabled, then the network.
  ///
  /// Must be called from within a tokio runtime. Returns the generation number
  /// assigned to this attempt.
  pub fn trigger(&mut self, url: impl Into<String>) -> u64 {
    let url = url.into();
    let generation = self.next_generation;
    self.next_generation += 1;
    self.in_flight += 1;
    self.url = Some(url.clone());

    debug!(url = %url, generation, "trigger");

    let reporter = Reporter {
      tx: self.tx.clone(),
      generation,
      finished: false,
    };
    let backend = self.backend.clone();
    let fetcher = Arc::clone(&self.fetcher);

    tokio::spawn(resolve(url, backend, fetcher, reporter));

    generation
  }

  /// Trigger again for the most recent URL. No-op before the first trigger.
  pub fn refetch(&mut self) -> Option<u64> {
    let url = self.url.clone()?;
    Some(self.trigger(url))
  }

  /// Apply any transitions that have arrived, without waiting.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(transition) = self.rx.try_recv() {
      self.apply(transition);
      changed = true;
    }
    changed
  }

  /// Wait until every triggered attempt has reached success or failure.
  pub async fn settle(&mut self) {
    while self.in_flight > 0 {
      match self.rx.recv().await {
        Some(transition) => self.apply(transition),
        None => break,
      }
    }
  }

  fn apply(&mut self, transition: Transition<T>) {
    match transition {
      Transition::Loading { generation } => {
        debug!(generation, "loading");
        self.network_pending.insert(generation);
        self.state.loading = true;
        self.state.error = None;
        self.state.phase = FetchPhase::Loading;
      }
      Transition::Success {
        generation,
        data,
        source,
      } => {
        self.finish(generation);
        self.state.data = Some(data);
        self.state.error = None;
        self.state.phase = FetchPhase::Success;
        self.state.source = Some(source);
      }
      Transition::Failure { generation, error } => {
        self.finish(generation);
        self.state.error = Some(error);
        self.state.phase = FetchPhase::Failure;
      }
    }
  }

  /// `loading` stays set while any network request is outstanding, so a cache
  /// hit landing mid-fetch does not clear it.
  fn finish(&mut self, generation: u64) {
    self.in_flight = self.in_flight.saturating_sub(1);
    self.network_pending.remove(&generation);
    self.state.loading = !self.network_pending.is_empty();
    match self.newest_settled {
      Some(newest) if newest > generation => {
        debug!(generation, newest, "older result overwrote newer state");
      }
      _ => self.newest_settled = Some(generation),
    }
  }
}

impl<T> FetchQuery<T> {
  pub fn state(&self) -> &FetchState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data.as_ref()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.state.error.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.state.loading
  }

  pub fn phase(&self) -> FetchPhase {
    self.state.phase
  }

  /// The URL of the most recent trigger.
  pub fn url(&self) -> Option<&str> {
    self.url.as_deref()
  }

  pub fn options(&self) -> FetchOptions {
    self.options
  }

  /// Number of triggers that have not reported a final result yet.
  pub fn in_flight(&self) -> usize {
    self.in_flight
  }
}

async fn resolve<T>(
  url: String,
  backend: Option<CacheBackend>,
  fetcher: Arc<dyn JsonFetcher>,
  reporter: Reporter<T>,
) where
  T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
  if let Some(backend) = &backend {
    if let Some(data) = backend.read::<T>(&url).await {
      debug!(url = %url, backend = %backend.method(), "cache hit");
      reporter.success(data, DataSource::Cache);
      return;
    }
    debug!(url = %url, backend = %backend.method(), "cache miss");
  }

  reporter.loading();

  let value = match fetcher.get_json(&url).await {
    Ok(value) => value,
    Err(error) => {
      info!(url = %url, error = %error, "fetch failed");
      reporter.failure(error);
      return;
    }
  };

  let data: T = match serde_json::from_value(value) {
    Ok(data) => data,
    Err(e) => {
      reporter.failure(FetchError::Decode {
        url: url.clone(),
        message: e.to_string(),
      });
      return;
    }
  };

  if let Some(backend) = &backend {
    backend.write(&url, &data).await;
  }

  info!(url = %url, "fetched");
  reporter.success(data, DataSource::Network);
}

impl<T: std::fmt::Debug> std::fmt::Debug for FetchQuery<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FetchQuery")
      .field("state", &self.state)
      .field("options", &self.options)
      .field("url", &self.url)
      .field("in_flight", &self.in_flight)
      .finish_non_exhaustive()
  }
}
