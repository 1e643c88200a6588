//! Page cursor driving a fetch controller.
//!
//! The cursor owns the page index and nothing else. Every navigation that
//! actually moves the index rebuilds the URL with the caller's builder and
//! triggers exactly one fetch; a navigation clamped at either end does nothing.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::error::{FetchError, PageError};
use crate::query::{FetchQuery, FetchState};

/// Builds the request URL for `(page_index, items_per_page)`.
pub type UrlBuilder = Box<dyn Fn(usize, usize) -> String + Send + Sync>;

/// Page geometry, fixed for the lifetime of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageOptions {
  pub items_per_page: usize,
  pub total_pages: usize,
}

impl Default for PageOptions {
  fn default() -> Self {
    Self {
      items_per_page: 5,
      total_pages: 5,
    }
  }
}

impl PageOptions {
  pub fn validate(&self) -> Result<(), PageError> {
    if self.items_per_page == 0 {
      return Err(PageError::ZeroItemsPerPage);
    }
    if self.total_pages == 0 {
      return Err(PageError::ZeroTotalPages);
    }
    // The last page's offset must be representable
    if (self.total_pages - 1).checked_mul(self.items_per_page).is_none() {
      return Err(PageError::TooManyItems {
        total_pages: self.total_pages,
        items_per_page: self.items_per_page,
      });
    }
    Ok(())
  }
}

/// Cursor over `total_pages` pages, each fetched through a `FetchQuery`.
pub struct PageCursor<T> {
  index: usize,
  options: PageOptions,
  build_url: UrlBuilder,
  query: FetchQuery<T>,
}

impl<T> PageCursor<T>
where
  T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
  /// Create a cursor on the first page and trigger its fetch.
  ///
  /// Must be called from within a tokio runtime.
  pub fn new<F>(build_url: F, options: PageOptions, query: FetchQuery<T>) -> Result<Self, PageError>
  where
    F: Fn(usize, usize) -> String + Send + Sync + 'static,
  {
    options.validate()?;

    let mut cursor = Self {
      index: 0,
      options,
      build_url: Box::new(build_url),
      query,
    };
    let url = cursor.url();
    cursor.query.trigger(url);

    Ok(cursor)
  }

  /// Move forward one page. Returns `false` when already on the last page.
  pub fn next(&mut self) -> bool {
    self.go_to((self.index + 1).min(self.last_index()))
  }

  /// Move back one page. Returns `false` when already on the first page.
  pub fn prev(&mut self) -> bool {
    self.go_to(self.index.saturating_sub(1))
  }

  pub fn first(&mut self) -> bool {
    self.go_to(0)
  }

  pub fn last(&mut self) -> bool {
    self.go_to(self.last_index())
  }

  /// Fetch the current page again.
  pub fn refetch(&mut self) {
    let url = self.url();
    self.query.trigger(url);
  }

  fn go_to(&mut self, index: usize) -> bool {
    if index == self.index {
      return false;
    }

    self.index = index;
    let url = self.url();
    debug!(page = index, url = %url, "page changed");
    self.query.trigger(url);
    true
  }

  /// Apply finished fetch transitions. Returns `true` if state changed.
  pub fn poll(&mut self) -> bool {
    self.query.poll()
  }

  /// Wait for every in-flight fetch to finish.
  pub async fn settle(&mut self) {
    self.query.settle().await;
  }
}

impl<T> PageCursor<T> {
  fn last_index(&self) -> usize {
    self.options.total_pages - 1
  }

  /// URL for the current page.
  pub fn url(&self) -> String {
    (self.build_url)(self.index, self.options.items_per_page)
  }

  /// Zero-based index of the current page.
  pub fn index(&self) -> usize {
    self.index
  }

  /// One-based number of the current page, for display.
  pub fn current_page_number(&self) -> usize {
    self.index + 1
  }

  pub fn items_per_page(&self) -> usize {
    self.options.items_per_page
  }

  pub fn total_pages(&self) -> usize {
    self.options.total_pages
  }

  pub fn total_pages_label(&self) -> String {
    self.options.total_pages.max(1).to_string()
  }

  /// True on the first page, or while a fetch is loading.
  pub fn is_first_page(&self) -> bool {
    self.index == 0 || self.query.is_loading()
  }

  /// True on the last page, or while a fetch is loading.
  pub fn is_last_page(&self) -> bool {
    self.index == self.last_index() || self.query.is_loading()
  }

  pub fn state(&self) -> &FetchState<T> {
    self.query.state()
  }

  pub fn data(&self) -> Option<&T> {
    self.query.data()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.query.error()
  }

  pub fn is_loading(&self) -> bool {
    self.query.is_loading()
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PageCursor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PageCursor")
      .field("index", &self.index)
      .field("options", &self.options)
      .field("query", &self.query)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{KeyValueStore, SavingMethod, StorageEnv};
  use crate::query::FetchOptions;
  use crate::testing::FakeFetcher;
  use serde_json::{json, Value};
  use std::sync::Arc;
  use std::time::Duration;

  fn host_url(index: usize, items: usize) -> String {
    format!("https://host/api?limit={}&skip={}", items, index * items)
  }

  fn cursor(fetcher: &Arc<FakeFetcher>, options: PageOptions) -> PageCursor<Value> {
    let query = FetchQuery::new(
      fetcher.clone(),
      &StorageEnv::default(),
      FetchOptions::default(),
    );
    PageCursor::new(host_url, options, query).unwrap()
  }

  fn twenty_pages() -> PageOptions {
    PageOptions {
      items_per_page: 2,
      total_pages: 20,
    }
  }

  #[tokio::test]
  async fn test_initial_page_is_fetched() {
    let fetcher = Arc::new(FakeFetcher::new());
    let mut cursor = cursor(&fetcher, twenty_pages());
    cursor.settle().await;

    assert_eq!(cursor.index(), 0);
    assert_eq!(fetcher.calls(), vec!["https://host/api?limit=2&skip=0"]);
    assert_eq!(
      cursor.data(),
      Some(&json!({"url": "https://host/api?limit=2&skip=0"}))
    );
  }

  #[tokio::test]
  async fn test_navigation_scenario() {
    let fetcher = Arc::new(FakeFetcher::new());
    let mut cursor = cursor(&fetcher, twenty_pages());
    cursor.settle().await;

    assert!(cursor.next());
    assert_eq!(cursor.index(), 1);
    assert_eq!(cursor.url(), "https://host/api?limit=2&skip=2");
    cursor.settle().await;
    assert_eq!(fetcher.call_count(), 2);

    assert!(cursor.last());
    assert_eq!(cursor.index(), 19);
    assert_eq!(cursor.url(), "https://host/api?limit=2&skip=38");
    cursor.settle().await;
    assert_eq!(fetcher.call_count(), 3);

    assert!(!cursor.next());
    assert_eq!(cursor.index(), 19);
    cursor.settle().await;
    assert_eq!(fetcher.call_count(), 3);

    assert_eq!(
      fetcher.calls(),
      vec![
        "https://host/api?limit=2&skip=0",
        "https://host/api?limit=2&skip=2",
        "https://host/api?limit=2&skip=38",
      ]
    );
    assert_eq!(
      cursor.data(),
      Some(&json!({"url": "https://host/api?limit=2&skip=38"}))
    );
  }

  #[tokio::test]
  async fn test_clamped_navigation_does_not_fetch() {
    let fetcher = Arc::new(FakeFetcher::new());
    let mut cursor = cursor(&fetcher, twenty_pages());
    cursor.settle().await;

    assert!(!cursor.prev());
    assert!(!cursor.first());
    cursor.settle().await;

    assert_eq!(cursor.index(), 0);
    assert_eq!(fetcher.call_count(), 1);
  }

  #[tokio::test]
  async fn test_index_stays_in_bounds() {
    let fetcher = Arc::new(FakeFetcher::new());
    let mut cursor = cursor(
      &fetcher,
      PageOptions {
        items_per_page: 3,
        total_pages: 4,
      },
    );

    // Deterministic mix of moves, heavy on the edges
    let moves = "nnnnnnppnlnnpppppfnnlpnflllpppppn";
    let mut expected_fetches = 1;
    for step in moves.chars() {
      let before = cursor.index();
      let moved = match step {
        'n' => cursor.next(),
        'p' => cursor.prev(),
        'f' => cursor.first(),
        'l' => cursor.last(),
        _ => unreachable!(),
      };

      assert!(cursor.index() < 4, "index {} out of range", cursor.index());
      assert_eq!(moved, cursor.index() != before);
      if moved {
        expected_fetches += 1;
      }
      cursor.settle().await;
    }

    assert_eq!(fetcher.call_count(), expected_fetches);
  }

  #[tokio::test]
  async fn test_single_page() {
    let fetcher = Arc::new(FakeFetcher::new());
    let mut cursor = cursor(
      &fetcher,
      PageOptions {
        items_per_page: 10,
        total_pages: 1,
      },
    );
    cursor.settle().await;

    assert!(!cursor.next());
    assert!(!cursor.prev());
    assert_eq!(cursor.index(), 0);
    assert!(cursor.is_first_page());
    assert!(cursor.is_last_page());
    assert_eq!(cursor.total_pages_label(), "1");
    assert_eq!(fetcher.call_count(), 1);
  }

  #[tokio::test]
  async fn test_zero_sizes_are_rejected() {
    let fetcher = Arc::new(FakeFetcher::new());
    let query: FetchQuery<Value> = FetchQuery::new(
      fetcher.clone(),
      &StorageEnv::default(),
      FetchOptions::default(),
    );
    let err = PageCursor::new(
      host_url,
      PageOptions {
        items_per_page: 2,
        total_pages: 0,
      },
      query,
    )
    .unwrap_err();
    assert_eq!(err, PageError::ZeroTotalPages);

    let query: FetchQuery<Value> = FetchQuery::new(
      fetcher.clone(),
      &StorageEnv::default(),
      FetchOptions::default(),
    );
    let err = PageCursor::new(
      host_url,
      PageOptions {
        items_per_page: 0,
        total_pages: 3,
      },
      query,
    )
    .unwrap_err();
    assert_eq!(err, PageError::ZeroItemsPerPage);

    assert_eq!(fetcher.call_count(), 0);
  }

  #[test]
  fn test_page_offset_overflow_is_rejected() {
    let options = PageOptions {
      items_per_page: usize::MAX / 2,
      total_pages: 4,
    };
    assert_eq!(
      options.validate(),
      Err(PageError::TooManyItems {
        total_pages: 4,
        items_per_page: usize::MAX / 2,
      })
    );

    // A single huge page has offset zero
    let single = PageOptions {
      items_per_page: usize::MAX,
      total_pages: 1,
    };
    assert_eq!(single.validate(), Ok(()));
  }

  #[tokio::test]
  async fn test_edges_disabled_while_loading() {
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.delay("https://host/api?limit=2&skip=2", Duration::from_millis(100));
    let mut cursor = cursor(&fetcher, twenty_pages());
    cursor.settle().await;

    assert!(cursor.is_first_page());
    assert!(!cursor.is_last_page());

    cursor.next();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cursor.poll();

    assert!(cursor.is_loading());
    assert!(cursor.is_first_page());
    assert!(cursor.is_last_page());

    cursor.settle().await;
    assert!(!cursor.is_first_page());
    assert!(!cursor.is_last_page());
    assert_eq!(cursor.current_page_number(), 2);
  }

  #[tokio::test]
  async fn test_revisited_page_comes_from_cache() {
    let fetcher = Arc::new(FakeFetcher::new());
    let query = FetchQuery::new(
      fetcher.clone(),
      &StorageEnv::default(),
      FetchOptions {
        save: true,
        saving_method: SavingMethod::Session,
      },
    );
    let mut cursor: PageCursor<Value> = PageCursor::new(host_url, twenty_pages(), query).unwrap();
    cursor.settle().await;

    cursor.next();
    cursor.settle().await;
    cursor.prev();
    cursor.settle().await;

    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(cursor.index(), 0);
    assert_eq!(
      cursor.data(),
      Some(&json!({"url": "https://host/api?limit=2&skip=0"}))
    );
  }

  #[tokio::test]
  async fn test_cache_hit_does_not_reenable_navigation_mid_fetch() {
    let fetcher = Arc::new(FakeFetcher::new());
    fetcher.delay("https://host/api?limit=2&skip=2", Duration::from_millis(200));
    let env = StorageEnv::default();
    env
      .session
      .set_item("https://host/api?limit=2&skip=0", r#"{"page":0}"#)
      .unwrap();
    let query = FetchQuery::new(
      fetcher.clone(),
      &env,
      FetchOptions {
        save: true,
        saving_method: SavingMethod::Session,
      },
    );
    let mut cursor: PageCursor<Value> = PageCursor::new(host_url, twenty_pages(), query).unwrap();
    cursor.settle().await;
    assert_eq!(fetcher.call_count(), 0);

    cursor.next();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cursor.poll();
    assert!(cursor.is_loading());

    // Page 0 is served from the cache while page 1 is still on the wire
    cursor.prev();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cursor.poll();

    assert_eq!(cursor.data(), Some(&json!({"page": 0})));
    assert!(cursor.is_loading());
    assert!(cursor.is_first_page());
    assert!(cursor.is_last_page());

    cursor.settle().await;
    assert!(!cursor.is_loading());
    assert!(!cursor.is_last_page());
  }

  #[tokio::test]
  async fn test_refetch_current_page() {
    let fetcher = Arc::new(FakeFetcher::new());
    let mut cursor = cursor(&fetcher, twenty_pages());
    cursor.settle().await;

    cursor.last();
    cursor.refetch();
    cursor.settle().await;

    assert_eq!(
      fetcher.calls(),
      vec![
        "https://host/api?limit=2&skip=0",
        "https://host/api?limit=2&skip=38",
        "https://host/api?limit=2&skip=38",
      ]
    );
  }

  #[tokio::test]
  async fn test_pages_over_http_with_response_cache() {
    use crate::cache::DiskResponseCache;
    use crate::client::HttpFetcher;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    for skip in ["0", "2"] {
      Mock::given(method("GET"))
        .and(path("/api/cats"))
        .and(query_param("limit", "2"))
        .and(query_param("skip", skip))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "skip": skip }])))
        .expect(1)
        .mount(&server)
        .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let env = StorageEnv::session_only()
      .with_response_cache(Arc::new(DiskResponseCache::open_at(dir.path()).unwrap()));
    let query = FetchQuery::new(
      Arc::new(HttpFetcher::new().unwrap()),
      &env,
      FetchOptions {
        save: true,
        saving_method: SavingMethod::ResponseCache,
      },
    );

    let base = server.uri();
    let mut cursor: PageCursor<Value> = PageCursor::new(
      move |index, items| format!("{}/api/cats?limit={}&skip={}", base, items, index * items),
      twenty_pages(),
      query,
    )
    .unwrap();
    cursor.settle().await;

    cursor.next();
    cursor.settle().await;
    assert_eq!(cursor.data(), Some(&json!([{ "skip": "2" }])));

    // Both pages are cached now, so going back and forth stays off the network
    cursor.prev();
    cursor.settle().await;
    cursor.next();
    cursor.settle().await;

    assert_eq!(cursor.data(), Some(&json!([{ "skip": "2" }])));
    assert!(cursor.error().is_none());
    // MockServer verifies the `expect(1)` counts on drop
  }
}
