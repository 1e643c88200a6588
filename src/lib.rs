//! Fetch JSON with optional caching, and page through it.
//!
//! - [`cache`]: interchangeable storage backends behind one read/write surface
//! - [`query`]: `FetchQuery`, the cache-then-network controller
//! - [`pagination`]: `PageCursor`, which turns page navigation into fetches

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod pagination;
pub mod query;

#[cfg(test)]
mod testing;

pub use cache::{CacheBackend, SavingMethod, StorageEnv};
pub use client::{HttpFetcher, JsonFetcher};
pub use error::{FetchError, PageError};
pub use pagination::{PageCursor, PageOptions};
pub use query::{DataSource, FetchOptions, FetchPhase, FetchQuery, FetchState};
