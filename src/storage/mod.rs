//! Storage Module
//!
//! The key-value store boundary the cache is layered over, plus an
//! in-process implementation.

mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StorageError;

pub use memory::MemoryStore;

// == Key-Value Store ==
/// A durable but "dumb" string-to-string store.
///
/// This is the cache's only I/O boundary. Implementations know nothing about
/// records, TTLs or tags; every operation may fail with a [`StorageError`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the raw value for `key`, or `None` if absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every key currently stored.
    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError>;

    /// Fetches several keys at once; every requested key appears in the result.
    async fn multi_get(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, Option<String>>, StorageError>;

    /// Writes several entries in one call.
    async fn multi_set(&self, entries: &[(String, String)]) -> Result<(), StorageError>;

    /// Removes several keys in one call.
    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError>;
}
