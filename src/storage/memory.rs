//! In-memory store
//!
//! A [`KeyValueStore`] kept in process memory. Handles are cheap to clone and
//! share the same map.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::KeyValueStore;
use crate::error::StorageError;

// == Memory Store ==
/// Process-local key-value store with sorted key enumeration.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of stored keys.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.read().await.keys().cloned().collect())
    }

    async fn multi_get(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, Option<String>>, StorageError> {
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .map(|key| (key.clone(), items.get(key).cloned()))
            .collect())
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        // Single write guard: the batch lands all at once
        let mut items = self.items.write().await;
        for (key, value) in entries {
            items.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}
