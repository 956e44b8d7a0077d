//! Cache Module
//!
//! Provides a key-value-store-backed cache with TTL expiration, LRU/FIFO
//! eviction and tag invalidation.

mod clock;
mod entry;
mod eviction;
mod manager;
mod pattern;
mod stats;


// Re-export public types
pub use clock::{Clock, MockClock, SystemClock};
pub use entry::CacheRecord;
pub use eviction::{EvictionPolicy, FifoPolicy, LruPolicy, RecordMeta};
pub use manager::{CacheItem, CacheManager};
pub use pattern::KeyPattern;
pub use stats::{AccessStats, CacheStats};
