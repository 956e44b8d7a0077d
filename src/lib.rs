//! KV Cache - a client-side cache over a durable key-value store
//!
//! Provides TTL expiration with self-healing reads, LRU/FIFO eviction,
//! tag-based invalidation, batch operations and usage statistics.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;

pub use cache::{CacheItem, CacheManager, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, Result, StorageError};
pub use storage::{KeyValueStore, MemoryStore};
