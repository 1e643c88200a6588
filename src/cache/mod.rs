//! Storage backends for fetched JSON.
//!
//! This module provides:
//! - Synchronous string key-value stores (in-memory session, SQLite persistent)
//! - An asynchronous request/response store keyed by request URL
//! - `CacheBackend`, which picks one of those by `SavingMethod` and gives them a
//!   single read/write surface that never fails the caller

mod backend;
mod response;
mod storage;

pub use backend::{CacheBackend, SavingMethod, StorageEnv};
pub use response::{CachedResponse, DiskResponseCache, ResponseStore, DEFAULT_CACHE_NAME};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
