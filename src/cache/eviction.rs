//! Eviction Policy Module
//!
//! Strategies that pick which entries to drop once the cache holds more
//! than a given number of records.

use std::cmp::Ordering;

// == Record Metadata ==
/// The slice of a stored record an eviction policy looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    /// Storage key (namespaced)
    pub key: String,
    /// Insertion time (Unix milliseconds)
    pub created_at: u64,
    /// Last successful read (Unix milliseconds)
    pub last_accessed_at: u64,
}

// == Eviction Policy ==
/// Chooses victims when a size bound is exceeded.
pub trait EvictionPolicy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Orders two records; the one sorting first is evicted first.
    fn victim_order(&self, a: &RecordMeta, b: &RecordMeta) -> Ordering;

    /// Returns exactly `records.len() - max_items` keys to remove, or none
    /// when the bound already holds. Equal timestamps break ties by key.
    fn select_victims(&self, records: &[RecordMeta], max_items: usize) -> Vec<String> {
        if records.len() <= max_items {
            return Vec::new();
        }

        let mut ordered: Vec<&RecordMeta> = records.iter().collect();
        ordered.sort_by(|a, b| self.victim_order(a, b).then_with(|| a.key.cmp(&b.key)));
        ordered
            .into_iter()
            .take(records.len() - max_items)
            .map(|meta| meta.key.clone())
            .collect()
    }
}

// == LRU ==
/// Least Recently Used: evicts the entries read longest ago.
#[derive(Debug, Clone, Copy, Default)]
pub struct LruPolicy;

impl EvictionPolicy for LruPolicy {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn victim_order(&self, a: &RecordMeta, b: &RecordMeta) -> Ordering {
        a.last_accessed_at.cmp(&b.last_accessed_at)
    }
}

// == FIFO ==
/// First In First Out: evicts the oldest insertions regardless of reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoPolicy;

impl EvictionPolicy for FifoPolicy {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn victim_order(&self, a: &RecordMeta, b: &RecordMeta) -> Ordering {
        a.created_at.cmp(&b.created_at)
    }
}
