//! Error types surfaced to callers of the fetch and pagination controllers.
//!
//! Cache read and write failures never show up here; they are logged and
//! recovered inside the cache layer.

use thiserror::Error;

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// The server answered with a non-2xx status.
  #[error("request to {url} failed with status {status}")]
  Status { url: String, status: u16 },

  /// The request never produced a response (DNS, connect, timeout, bad URL).
  #[error("request to {url} failed: {message}")]
  Transport { url: String, message: String },

  /// The body was not JSON, or did not decode into the requested type.
  #[error("could not decode response from {url}: {message}")]
  Decode { url: String, message: String },

  /// The fetch task went away without reporting a result.
  #[error("fetch was cancelled")]
  Cancelled,
}

/// Invalid pagination settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
  #[error("items per page must be at least 1")]
  ZeroItemsPerPage,

  #[error("total pages must be at least 1")]
  ZeroTotalPages,

  #[error("{total_pages} pages of {items_per_page} items overflow the page offset")]
  TooManyItems {
    total_pages: usize,
    items_per_page: usize,
  },
}
