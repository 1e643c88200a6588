//! Test doubles shared by the controller tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::cache::{KeyValueStore, MemoryStore};
use crate::client::JsonFetcher;
use crate::error::FetchError;

/// In-memory fetcher that records every URL it is asked for.
///
/// Unknown URLs answer `{"url": <url>}`.
#[derive(Default)]
pub struct FakeFetcher {
  responses: Mutex<HashMap<String, Result<Value, FetchError>>>,
  delays: Mutex<HashMap<String, Duration>>,
  calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, value: Value) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(url.to_string(), Ok(value));
  }

  pub fn fail(&self, url: &str, error: FetchError) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(url.to_string(), Err(error));
  }

  pub fn delay(&self, url: &str, delay: Duration) {
    self
      .delays
      .lock()
      .unwrap()
      .insert(url.to_string(), delay);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl JsonFetcher for FakeFetcher {
  async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
    self.calls.lock().unwrap().push(url.to_string());

    let delay = self.delays.lock().unwrap().get(url).copied();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    let response = self.responses.lock().unwrap().get(url).cloned();
    response.unwrap_or_else(|| Ok(json!({ "url": url })))
  }
}

/// Key-value store that counts reads and writes and can be told to fail them.
#[derive(Default)]
pub struct RecordingStore {
  inner: MemoryStore,
  fail_reads: bool,
  fail_writes: bool,
  reads: AtomicUsize,
  writes: AtomicUsize,
}

impl RecordingStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// A store whose reads and writes all return errors.
  pub fn failing() -> Self {
    Self {
      fail_reads: true,
      fail_writes: true,
      ..Self::default()
    }
  }

  pub fn reads(&self) -> usize {
    self.reads.load(Ordering::SeqCst)
  }

  pub fn writes(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }
}

impl KeyValueStore for RecordingStore {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    if self.fail_reads {
      return Err(eyre!("storage unavailable"));
    }
    self.inner.get_item(key)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    self.writes.fetch_add(1, Ordering::SeqCst);
    if self.fail_writes {
      return Err(eyre!("quota exceeded"));
    }
    self.inner.set_item(key, value)
  }
}
