//! Cache Manager Module
//!
//! The public façade: namespaced keys, TTL with self-healing reads, batch
//! operations, tag and pattern invalidation, eviction and statistics, all
//! layered over a [`KeyValueStore`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::entry::CacheRecord;
use crate::cache::eviction::{EvictionPolicy, FifoPolicy, LruPolicy, RecordMeta};
use crate::cache::pattern::KeyPattern;
use crate::cache::stats::{AccessCounters, AccessStats, CacheStats};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::storage::KeyValueStore;

// == Cache Item ==
/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem<T> {
    /// Logical key (without the namespace prefix)
    pub key: String,
    /// The data to cache
    pub data: T,
    /// TTL in seconds (uses the configured default if None)
    pub ttl: Option<u64>,
}

impl<T> CacheItem<T> {
    /// Creates an item that takes the configured default TTL.
    pub fn new(key: impl Into<String>, data: T) -> Self {
        Self {
            key: key.into(),
            data,
            ttl: None,
        }
    }

    /// Overrides the TTL in seconds.
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Outcome of reading one stored value.
enum Lookup {
    Absent,
    Hit(CacheRecord),
    /// Expired or undecodable; must be purged
    Stale,
}

// == Cache Manager ==
/// Client-side cache over a key-value store.
///
/// Construct once at the application's composition root and share by
/// reference. There is no background sweep: expired entries are removed when
/// a read trips over them or when [`clear_expired`](Self::clear_expired) runs.
#[derive(Debug)]
pub struct CacheManager<S, C = SystemClock> {
    store: S,
    clock: C,
    config: CacheConfig,
    counters: AccessCounters,
}

impl<S: KeyValueStore> CacheManager<S, SystemClock> {
    // == Constructor ==
    /// Creates a manager with the default configuration and the system clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
            config: CacheConfig::default(),
            counters: AccessCounters::default(),
        }
    }

    /// Creates a manager with a custom configuration.
    pub fn with_config(store: S, config: CacheConfig) -> Result<Self> {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> CacheManager<S, C> {
    /// Creates a manager with a custom clock (useful for testing).
    pub fn with_clock(store: S, config: CacheConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            config,
            counters: AccessCounters::default(),
        })
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // == Key Helpers ==
    /// Maps a logical key to its namespaced storage key.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn logical_key<'a>(&self, storage_key: &'a str) -> Option<&'a str> {
        storage_key.strip_prefix(self.config.key_prefix.as_str())
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::Validation("Key cannot be empty".to_string()));
        }
        Ok(())
    }

    fn resolve_ttl(&self, ttl: Option<u64>) -> Result<u64> {
        match ttl {
            Some(0) => Err(CacheError::Validation(
                "TTL must be greater than zero".to_string(),
            )),
            Some(ttl) => Ok(ttl),
            None => Ok(self.config.default_ttl_seconds),
        }
    }

    /// Validates and encodes one write, returning `(storage_key, raw)`.
    fn prepare<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        ttl: Option<u64>,
        tags: BTreeSet<String>,
        now: u64,
    ) -> Result<(String, String)> {
        Self::validate_key(key)?;
        let ttl_seconds = self.resolve_ttl(ttl)?;
        let data = serde_json::to_value(data)?;
        let raw = CacheRecord::new(data, ttl_seconds, tags, now).encode()?;
        Ok((self.storage_key(key), raw))
    }

    // == Set ==
    /// Stores `data` under `key`, replacing any previous record.
    ///
    /// # Arguments
    /// * `key` - Logical key, must be non-empty
    /// * `data` - Any serializable value
    /// * `ttl` - Optional TTL in seconds (uses the default if None, rejects 0)
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        ttl: Option<u64>,
    ) -> Result<()> {
        self.set_with_tags(key, data, std::iter::empty::<String>(), ttl)
            .await
    }

    // == Set With Tags ==
    /// Stores `data` under `key` and labels it for [`clear_by_tag`](Self::clear_by_tag).
    pub async fn set_with_tags<T, I, G>(
        &self,
        key: &str,
        data: &T,
        tags: I,
        ttl: Option<u64>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        let (storage_key, raw) = self.prepare(key, data, ttl, tags, self.clock.now_ms())?;
        self.store.set_item(&storage_key, &raw).await?;
        debug!("Cached {}", storage_key);
        Ok(())
    }

    // == Read Path ==
    fn classify(&self, storage_key: &str, raw: Option<String>, now: u64) -> Lookup {
        let Some(raw) = raw else {
            return Lookup::Absent;
        };
        match CacheRecord::decode(&raw) {
            Ok(record) if record.is_valid(now) => Lookup::Hit(record),
            Ok(_) => {
                debug!("Entry {} expired", storage_key);
                Lookup::Stale
            }
            Err(err) => {
                warn!("Discarding unreadable entry {}: {}", storage_key, err);
                Lookup::Stale
            }
        }
    }

    /// Fetches and validates one record, purging it if stale.
    async fn load(&self, key: &str) -> Option<(String, CacheRecord)> {
        if key.is_empty() {
            return None;
        }
        let storage_key = self.storage_key(key);
        let raw = match self.store.get_item(&storage_key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Read of {} failed, treating as miss: {}", storage_key, err);
                return None;
            }
        };

        match self.classify(&storage_key, raw, self.clock.now_ms()) {
            Lookup::Hit(record) => Some((storage_key, record)),
            Lookup::Absent => None,
            Lookup::Stale => {
                self.purge(std::slice::from_ref(&storage_key)).await;
                None
            }
        }
    }

    /// Best-effort removal of stale keys found by a read.
    async fn purge(&self, storage_keys: &[String]) {
        if storage_keys.is_empty() {
            return;
        }
        let result = match storage_keys {
            [single] => self.store.remove_item(single).await,
            many => self.store.multi_remove(many).await,
        };
        match result {
            Ok(()) => self.counters.record_purged(storage_keys.len()),
            Err(err) => warn!(
                "Purge of {} stale entries failed: {}",
                storage_keys.len(),
                err
            ),
        }
    }

    /// Best-effort refresh of `lastAccessed` on records just read.
    async fn touch(&self, hits: Vec<(String, CacheRecord)>, now: u64) {
        let entries: Vec<(String, String)> = hits
            .into_iter()
            .filter(|(_, record)| record.last_accessed_at < now)
            .filter_map(|(storage_key, mut record)| {
                record.last_accessed_at = now;
                record.encode().ok().map(|raw| (storage_key, raw))
            })
            .collect();

        let result = match entries.as_slice() {
            [] => return,
            [(key, raw)] => self.store.set_item(key, raw).await,
            many => self.store.multi_set(many).await,
        };
        if let Err(err) = result {
            warn!("Recency update for {} entries failed: {}", entries.len(), err);
        }
    }

    fn into_typed<T: DeserializeOwned>(key: &str, data: Value) -> Option<T> {
        match serde_json::from_value(data) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Cached data for {} has an unexpected shape: {}", key, err);
                None
            }
        }
    }

    // == Get ==
    /// Returns the cached data, or None if absent, expired or unreadable.
    ///
    /// Never fails: storage and decoding problems degrade to a miss. Expired
    /// and unreadable entries are removed from the store on the way out.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some((storage_key, record)) = self.load(key).await else {
            self.counters.record_miss();
            return None;
        };

        let Some(value) = Self::into_typed(key, record.data.clone()) else {
            self.counters.record_miss();
            return None;
        };

        self.counters.record_hit();
        self.touch(vec![(storage_key, record)], self.clock.now_ms())
            .await;
        Some(value)
    }

    // == Has ==
    /// Same validity semantics as [`get`](Self::get) without decoding the data.
    pub async fn has(&self, key: &str) -> bool {
        match self.load(key).await {
            Some(hit) => {
                self.counters.record_hit();
                self.touch(vec![hit], self.clock.now_ms()).await;
                true
            }
            None => {
                self.counters.record_miss();
                false
            }
        }
    }

    // == TTL Remaining ==
    /// Remaining lifetime in seconds of a valid entry. Does not count as an access.
    pub async fn ttl_remaining(&self, key: &str) -> Option<u64> {
        self.load(key)
            .await
            .map(|(_, record)| record.ttl_remaining(self.clock.now_ms()))
    }

    // == Get Or Insert ==
    /// Returns the cached value, or runs `fetch`, caches its result and returns it.
    ///
    /// A failed write after a successful fetch is logged and the fetched value
    /// is still returned.
    pub async fn get_or_insert_with<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<u64>,
        fetch: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        Self::validate_key(key)?;
        self.resolve_ttl(ttl)?;

        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = fetch().await;
        if let Err(err) = self.set(key, &value, ttl).await {
            warn!("Failed to cache fetched value for {}: {}", key, err);
        }
        Ok(value)
    }

    // == Delete ==
    /// Removes an entry. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove_item(&self.storage_key(key)).await?;
        Ok(())
    }

    // == Set Multiple ==
    /// Writes every item in one store call.
    ///
    /// All items are validated and encoded before any I/O, so a bad item
    /// leaves the store untouched.
    pub async fn set_multiple<T: Serialize>(&self, items: &[CacheItem<T>]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let now = self.clock.now_ms();
        let entries = items
            .iter()
            .map(|item| self.prepare(&item.key, &item.data, item.ttl, BTreeSet::new(), now))
            .collect::<Result<Vec<_>>>()?;

        self.store.multi_set(&entries).await?;
        debug!("Cached {} entries in one batch", entries.len());
        Ok(())
    }

    /// Aligned lookups for a batch of keys: one store read and one purge.
    ///
    /// Returns `(storage_key, record)` per input key; counters and recency
    /// are left to [`resolve_many`](Self::resolve_many).
    async fn load_many<K: AsRef<str>>(
        &self,
        keys: &[K],
    ) -> Vec<Option<(String, CacheRecord)>> {
        let storage_keys: Vec<Option<String>> = keys
            .iter()
            .map(|key| {
                let key = key.as_ref();
                (!key.is_empty()).then(|| self.storage_key(key))
            })
            .collect();

        let mut seen = HashSet::new();
        let requested: Vec<String> = storage_keys
            .iter()
            .flatten()
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect();

        let mut fetched = if requested.is_empty() {
            HashMap::new()
        } else {
            match self.store.multi_get(&requested).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    warn!(
                        "Batch read of {} keys failed, treating as misses: {}",
                        requested.len(),
                        err
                    );
                    HashMap::new()
                }
            }
        };

        let now = self.clock.now_ms();
        let mut hits = HashMap::new();
        let mut stale = Vec::new();
        for storage_key in requested {
            let raw = fetched.remove(&storage_key).flatten();
            match self.classify(&storage_key, raw, now) {
                Lookup::Hit(record) => {
                    hits.insert(storage_key, record);
                }
                Lookup::Stale => stale.push(storage_key),
                Lookup::Absent => {}
            }
        }
        self.purge(&stale).await;

        storage_keys
            .into_iter()
            .map(|storage_key| {
                let storage_key = storage_key?;
                let record = hits.get(&storage_key)?.clone();
                Some((storage_key, record))
            })
            .collect()
    }

    /// Typed batch read: a key is a hit only when its data converts to `T`.
    /// Only hits are counted as such and have their recency refreshed, in
    /// one store write.
    async fn resolve_many<T, K>(&self, keys: &[K]) -> Vec<Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        let loaded = self.load_many(keys).await;
        let mut touched = HashMap::new();
        let values = keys
            .iter()
            .zip(loaded)
            .map(|(key, hit)| {
                let typed = hit.and_then(|(storage_key, record)| {
                    let value = Self::into_typed(key.as_ref(), record.data.clone())?;
                    touched.insert(storage_key, record);
                    Some(value)
                });
                if typed.is_some() {
                    self.counters.record_hit();
                } else {
                    self.counters.record_miss();
                }
                typed
            })
            .collect();

        self.touch(touched.into_iter().collect(), self.clock.now_ms())
            .await;
        values
    }

    // == Get Multiple ==
    /// Looks up several keys at once. Every requested key appears in the
    /// result, mapped to its data or None.
    pub async fn get_multiple<T, K>(&self, keys: &[K]) -> HashMap<String, Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str> + Sync,
    {
        let values = self.resolve_many(keys).await;
        keys.iter()
            .zip(values)
            .map(|(key, value)| (key.as_ref().to_string(), value))
            .collect()
    }

    // == Prefetch ==
    /// Resolves several keys, returning results in input order.
    pub async fn prefetch<T, K>(&self, keys: &[K]) -> Vec<Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str> + Sync,
    {
        self.resolve_many(keys).await
    }

    // == Delete Multiple ==
    /// Removes several entries in one store call. Absent keys are ignored.
    pub async fn delete_multiple<K: AsRef<str> + Sync>(&self, keys: &[K]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let storage_keys: Vec<String> = keys
            .iter()
            .map(|key| self.storage_key(key.as_ref()))
            .collect();
        self.store.multi_remove(&storage_keys).await?;
        Ok(())
    }

    // == Warmup ==
    /// Pre-populates the cache item by item.
    ///
    /// A failing item is logged and skipped; returns how many were stored.
    pub async fn warmup<T: Serialize>(&self, items: &[CacheItem<T>]) -> usize {
        let mut loaded = 0;
        for item in items {
            match self.set(&item.key, &item.data, item.ttl).await {
                Ok(()) => loaded += 1,
                Err(err) => warn!("Warmup skipped {}: {}", item.key, err),
            }
        }
        info!("Cache warmup: stored {}/{} entries", loaded, items.len());
        loaded
    }

    // == Scans ==
    /// Snapshot of every `(storage_key, raw)` pair in this cache's namespace.
    async fn scan(&self) -> Result<Vec<(String, String)>> {
        let keys: Vec<String> = self
            .store
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|key| self.logical_key(key).is_some())
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut fetched = self.store.multi_get(&keys).await?;
        // Keys removed since enumeration drop out of the snapshot
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                let raw = fetched.remove(&key).flatten()?;
                Some((key, raw))
            })
            .collect())
    }

    async fn remove_all(&self, storage_keys: &[String]) -> Result<usize> {
        if storage_keys.is_empty() {
            return Ok(0);
        }
        self.store.multi_remove(storage_keys).await?;
        Ok(storage_keys.len())
    }

    // == Keys ==
    /// Logical keys of every entry in the namespace, valid or not.
    pub async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .get_all_keys()
            .await?
            .iter()
            .filter_map(|key| self.logical_key(key).map(str::to_string))
            .collect())
    }

    // == Clear All ==
    /// Removes every key in the underlying store, including keys outside
    /// this cache's namespace. See [`clear_namespace`](Self::clear_namespace)
    /// for the scoped variant.
    pub async fn clear_all(&self) -> Result<usize> {
        let keys = self.store.get_all_keys().await?;
        let removed = self.remove_all(&keys).await?;
        info!("Cleared entire store: {} keys", removed);
        Ok(removed)
    }

    // == Clear Namespace ==
    /// Removes every key carrying this cache's prefix.
    pub async fn clear_namespace(&self) -> Result<usize> {
        let keys: Vec<String> = self
            .store
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|key| self.logical_key(key).is_some())
            .collect();
        let removed = self.remove_all(&keys).await?;
        info!("Cleared cache namespace: {} keys", removed);
        Ok(removed)
    }

    // == Clear Expired ==
    /// Removes every expired or unreadable entry.
    ///
    /// Returns the number of entries removed.
    pub async fn clear_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .scan()
            .await?
            .into_iter()
            .filter(|(_, raw)| {
                !matches!(CacheRecord::decode(raw), Ok(record) if record.is_valid(now))
            })
            .map(|(key, _)| key)
            .collect();

        let removed = self.remove_all(&expired).await?;
        if removed > 0 {
            info!("TTL cleanup: removed {} expired entries", removed);
        } else {
            debug!("TTL cleanup: no expired entries found");
        }
        Ok(removed)
    }

    // == Clear By Pattern ==
    /// Removes entries whose logical key matches `pattern`.
    ///
    /// Accepts an exact key or a prefix with one trailing `*` (`user_*`).
    /// Other glob forms are rejected with a validation error.
    pub async fn clear_by_pattern(&self, pattern: &str) -> Result<usize> {
        let pattern = KeyPattern::parse(pattern)?;
        let keys: Vec<String> = self
            .store
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|key| self.logical_key(key).is_some_and(|name| pattern.matches(name)))
            .collect();

        let removed = self.remove_all(&keys).await?;
        info!("Cleared {} entries matching {:?}", removed, pattern);
        Ok(removed)
    }

    // == Tag Index ==
    async fn storage_keys_for_tag(&self, tag: &str) -> Result<Vec<String>> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter(|(_, raw)| {
                matches!(CacheRecord::decode(raw), Ok(record) if record.has_tag(tag))
            })
            .map(|(key, _)| key)
            .collect())
    }

    /// Logical keys of every stored entry labelled with `tag`.
    ///
    /// Recomputed from the stored records on each call; there is no
    /// persisted secondary index.
    pub async fn keys_for_tag(&self, tag: &str) -> Result<Vec<String>> {
        Ok(self
            .storage_keys_for_tag(tag)
            .await?
            .iter()
            .filter_map(|key| self.logical_key(key).map(str::to_string))
            .collect())
    }

    // == Clear By Tag ==
    /// Removes every entry labelled with `tag` in one batched delete.
    pub async fn clear_by_tag(&self, tag: &str) -> Result<usize> {
        let keys = self.storage_keys_for_tag(tag).await?;
        let removed = self.remove_all(&keys).await?;
        info!("Cleared {} entries tagged {}", removed, tag);
        Ok(removed)
    }

    // == Stats ==
    /// Classifies every entry in the namespace as valid or expired.
    ///
    /// Read-only: expired entries are counted, not removed. Unreadable
    /// entries count as expired.
    pub async fn get_stats(&self) -> Result<CacheStats> {
        let now = self.clock.now_ms();
        let mut stats = CacheStats::default();
        for (_, raw) in self.scan().await? {
            match CacheRecord::decode(&raw) {
                Ok(record) if record.is_valid(now) => stats.record_valid(raw.len()),
                _ => stats.record_expired(raw.len()),
            }
        }
        Ok(stats)
    }

    /// Hit/miss/eviction counters accumulated by this manager.
    pub fn access_stats(&self) -> AccessStats {
        self.counters.snapshot()
    }

    // == Eviction ==
    /// Trims the namespace down to `max_items` readable records using `policy`.
    ///
    /// Returns the number of entries evicted.
    pub async fn apply_eviction(
        &self,
        policy: &dyn EvictionPolicy,
        max_items: usize,
    ) -> Result<usize> {
        let records: Vec<RecordMeta> = self
            .scan()
            .await?
            .into_iter()
            .filter_map(|(key, raw)| {
                let record = CacheRecord::decode(&raw).ok()?;
                Some(RecordMeta {
                    key,
                    created_at: record.created_at,
                    last_accessed_at: record.last_accessed_at,
                })
            })
            .collect();

        let victims = policy.select_victims(&records, max_items);
        let evicted = self.remove_all(&victims).await?;
        if evicted > 0 {
            self.counters.record_evictions(evicted);
            info!(
                "{} eviction: removed {} of {} entries (max {})",
                policy.name(),
                evicted,
                records.len(),
                max_items
            );
        }
        Ok(evicted)
    }

    /// Evicts least recently read entries beyond `max_items`.
    pub async fn apply_lru_strategy(&self, max_items: usize) -> Result<usize> {
        self.apply_eviction(&LruPolicy, max_items).await
    }

    /// Evicts earliest inserted entries beyond `max_items`.
    pub async fn apply_fifo_strategy(&self, max_items: usize) -> Result<usize> {
        self.apply_eviction(&FifoPolicy, max_items).await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::MockClock;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn manager() -> (CacheManager<MemoryStore, MockClock>, MemoryStore, MockClock) {
        let store = MemoryStore::new();
        let clock = MockClock::at(1_000_000);
        let cache =
            CacheManager::with_clock(store.clone(), CacheConfig::default(), clock.clone()).unwrap();
        (cache, store, clock)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (cache, store, _) = manager();

        cache.set("key1", "value1", None).await.unwrap();

        assert_eq!(cache.get::<String>("key1").await, Some("value1".to_string()));
        assert!(store.get_item("cache_key1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_default_ttl_applied() {
        let (cache, store, _) = manager();

        cache.set("key1", &1, None).await.unwrap();

        let raw = store.get_item("cache_key1").await.unwrap().unwrap();
        assert_eq!(CacheRecord::decode(&raw).unwrap().ttl_seconds, 1800);
    }

    #[tokio::test]
    async fn test_rejects_zero_ttl_and_empty_key() {
        let (cache, store, _) = manager();

        assert!(matches!(
            cache.set("key1", &1, Some(0)).await,
            Err(CacheError::Validation(_))
        ));
        assert!(matches!(
            cache.set("", &1, None).await,
            Err(CacheError::Validation(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_tags() {
        let (cache, _, _) = manager();

        cache
            .set_with_tags("key1", &1, ["user"], None)
            .await
            .unwrap();
        cache.set("key1", &2, None).await.unwrap();

        assert_eq!(cache.get::<i32>("key1").await, Some(2));
        assert!(cache.keys_for_tag("user").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_get_purges() {
        let (cache, store, clock) = manager();

        cache.set("key1", "value1", Some(1)).await.unwrap();
        clock.advance(Duration::from_millis(1_001));

        assert_eq!(cache.get::<String>("key1").await, None);
        assert!(store.is_empty().await);
        assert_eq!(cache.access_stats().purged, 1);
    }

    #[tokio::test]
    async fn test_has_follows_get_semantics() {
        let (cache, store, clock) = manager();

        cache.set("key1", &1, Some(1)).await.unwrap();
        assert!(cache.has("key1").await);
        assert!(!cache.has("missing").await);
        assert!(!cache.has("").await);

        clock.advance(Duration::from_secs(2));
        assert!(!cache.has("key1").await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_refreshes_recency() {
        let (cache, store, clock) = manager();

        cache.set("key1", &1, None).await.unwrap();
        clock.advance(Duration::from_millis(250));
        cache.get::<i32>("key1").await.unwrap();

        let raw = store.get_item("cache_key1").await.unwrap().unwrap();
        let record = CacheRecord::decode(&raw).unwrap();
        assert_eq!(record.created_at, 1_000_000);
        assert_eq!(record.last_accessed_at, 1_000_250);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_miss_but_kept() {
        let (cache, store, _) = manager();

        cache.set("key1", "text", None).await.unwrap();

        assert_eq!(cache.get::<u32>("key1").await, None);
        assert!(store.get_item("cache_key1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_batch_type_mismatch_counts_miss_and_keeps_recency() {
        let (cache, store, clock) = manager();

        cache.set("k", "text", None).await.unwrap();
        clock.advance(Duration::from_millis(100));

        assert_eq!(cache.get::<u32>("k").await, None);
        assert_eq!(cache.get_multiple::<u32, _>(&["k"]).await["k"], None);
        assert_eq!(cache.prefetch::<u32, _>(&["k"]).await, vec![None]);

        let stats = cache.access_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 3);

        let raw = store.get_item("cache_k").await.unwrap().unwrap();
        let record = CacheRecord::decode(&raw).unwrap();
        assert_eq!(record.last_accessed_at, record.created_at);
    }

    #[tokio::test]
    async fn test_batch_hit_refreshes_recency() {
        let (cache, store, clock) = manager();

        cache.set("k", &1, None).await.unwrap();
        clock.advance(Duration::from_millis(100));

        assert_eq!(cache.prefetch::<i32, _>(&["k", "k"]).await, vec![Some(1), Some(1)]);
        assert_eq!(cache.access_stats().hits, 2);

        let raw = store.get_item("cache_k").await.unwrap().unwrap();
        let record = CacheRecord::decode(&raw).unwrap();
        assert_eq!(record.last_accessed_at, 1_000_100);
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let (cache, _, clock) = manager();

        cache.set("key1", &1, Some(10)).await.unwrap();
        clock.advance(Duration::from_millis(2_500));

        assert_eq!(cache.ttl_remaining("key1").await, Some(7));
        assert_eq!(cache.ttl_remaining("missing").await, None);
    }

    #[tokio::test]
    async fn test_get_or_insert_with() {
        let (cache, _, _) = manager();

        let value: i32 = cache
            .get_or_insert_with("key1", None, || async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let value: i32 = cache
            .get_or_insert_with("key1", None, || async { 99 })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (cache, _, _) = manager();

        cache.set("key1", &1, None).await.unwrap();
        cache.delete("key1").await.unwrap();
        cache.delete("key1").await.unwrap();

        assert!(!cache.has("key1").await);
    }

    #[tokio::test]
    async fn test_set_multiple_validates_before_writing() {
        let (cache, store, _) = manager();

        let items = vec![
            CacheItem::new("a", json!(1)),
            CacheItem::new("b", json!(2)).with_ttl(0),
        ];

        assert!(cache.set_multiple(&items).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_multiple_handles_duplicates_and_empty_keys() {
        let (cache, _, _) = manager();

        cache.set("a", &1, None).await.unwrap();

        let result = cache.get_multiple::<i32, _>(&["a", "a", ""]).await;
        assert_eq!(result.len(), 2);
        assert_eq!(result["a"], Some(1));
        assert_eq!(result[""], None);
    }

    #[tokio::test]
    async fn test_prefetch_keeps_order() {
        let (cache, _, _) = manager();

        cache.set("a", &1, None).await.unwrap();
        cache.set("c", &3, None).await.unwrap();

        let values = cache.prefetch::<i32, _>(&["c", "b", "a"]).await;
        assert_eq!(values, vec![Some(3), None, Some(1)]);
    }

    #[tokio::test]
    async fn test_keys_strip_prefix() {
        let (cache, store, _) = manager();

        cache.set("a", &1, None).await.unwrap();
        store.set_item("foreign", "x").await.unwrap();

        assert_eq!(cache.keys().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_clear_namespace_spares_foreign_keys() {
        let (cache, store, _) = manager();

        cache.set("a", &1, None).await.unwrap();
        cache.set("b", &2, None).await.unwrap();
        store.set_item("foreign", "x").await.unwrap();

        assert_eq!(cache.clear_namespace().await.unwrap(), 2);
        assert_eq!(store.get_all_keys().await.unwrap(), vec!["foreign"]);
    }

    #[tokio::test]
    async fn test_clear_all_wipes_store() {
        let (cache, store, _) = manager();

        cache.set("a", &1, None).await.unwrap();
        store.set_item("foreign", "x").await.unwrap();

        assert_eq!(cache.clear_all().await.unwrap(), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_by_pattern() {
        let (cache, _, _) = manager();

        cache.set("user_1", &1, None).await.unwrap();
        cache.set("user_2", &2, None).await.unwrap();
        cache.set("card_1", &3, None).await.unwrap();

        assert_eq!(cache.clear_by_pattern("user_*").await.unwrap(), 2);
        assert_eq!(cache.keys().await.unwrap(), vec!["card_1"]);
        assert!(matches!(
            cache.clear_by_pattern("*_1").await,
            Err(CacheError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_expired_removes_unreadable() {
        let (cache, store, clock) = manager();

        cache.set("short", &1, Some(1)).await.unwrap();
        cache.set("long", &2, Some(60)).await.unwrap();
        store.set_item("cache_broken", "{").await.unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.clear_expired().await.unwrap(), 2);
        assert_eq!(cache.keys().await.unwrap(), vec!["long"]);
    }

    #[tokio::test]
    async fn test_eviction_counts() {
        let (cache, _, clock) = manager();

        for key in ["k1", "k2", "k3", "k4"] {
            cache.set(key, &1, None).await.unwrap();
            clock.advance(Duration::from_millis(10));
        }

        assert_eq!(cache.apply_fifo_strategy(2).await.unwrap(), 2);
        assert_eq!(cache.apply_lru_strategy(2).await.unwrap(), 0);
        assert_eq!(cache.keys().await.unwrap(), vec!["k3", "k4"]);
        assert_eq!(cache.access_stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_access_stats() {
        let (cache, _, _) = manager();

        cache.set("a", &1, None).await.unwrap();
        cache.get::<i32>("a").await;
        cache.get::<i32>("missing").await;

        let stats = cache.access_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let store = MemoryStore::new();
        let config = CacheConfig {
            key_prefix: "app:".to_string(),
            ..CacheConfig::default()
        };
        let cache = CacheManager::with_config(store.clone(), config).unwrap();

        cache.set("a", &1, None).await.unwrap();
        assert_eq!(store.get_all_keys().await.unwrap(), vec!["app:a"]);
        assert_eq!(cache.get::<i32>("a").await, Some(1));
    }
}
