//! Cache Statistics Module
//!
//! Storage snapshots (valid/expired counts) and in-process access counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time classification of everything in the cache namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of stored entries
    pub total_items: usize,
    /// Entries still within their TTL
    pub valid_items: usize,
    /// Entries past their TTL or unreadable
    pub expired_items: usize,
    /// Sum of stored value lengths in bytes
    pub total_size: usize,
}

impl CacheStats {
    // == Record Valid ==
    /// Counts one entry still within its TTL.
    pub fn record_valid(&mut self, size: usize) {
        self.total_items += 1;
        self.valid_items += 1;
        self.total_size += size;
    }

    // == Record Expired ==
    /// Counts one expired or unreadable entry.
    pub fn record_expired(&mut self, size: usize) {
        self.total_items += 1;
        self.expired_items += 1;
        self.total_size += size;
    }
}

// == Access Stats ==
/// Counters accumulated by one cache manager since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessStats {
    /// Reads that returned data
    pub hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Entries removed by an eviction policy
    pub evictions: u64,
    /// Entries removed by read-time expiration
    pub purged: u64,
}

impl AccessStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Access Counters ==
/// Lock-free counters behind [`AccessStats`], shared through `&self`.
#[derive(Debug, Default)]
pub(crate) struct AccessCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    purged: AtomicU64,
}

impl AccessCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_purged(&self, count: usize) {
        self.purged.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> AccessStats {
        AccessStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}
