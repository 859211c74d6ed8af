//! Durable token storage

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Pluggable persistence for the serialized token blob.
///
/// Implementations may be backed by anything from an in-memory map to a
/// platform keychain; the manager only ever holds one record per instance,
/// keyed by `{prefix}tokens`.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Store a value under the given key.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Fetch the value stored under the given key, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Remove the value stored under the given key. Removing a missing key is
    /// not an error.
    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Default in-memory storage. Sessions do not survive the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| Error::Storage("storage lock poisoned".to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .read()
            .map_err(|_| Error::Storage("storage lock poisoned".to_string()))?;
        Ok(items.get(key).cloned())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| Error::Storage("storage lock poisoned".to_string()))?;
        items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryTokenStorage::new();
        assert_eq!(storage.get_item("k").await.unwrap(), None);

        storage.set_item("k", "v1").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), Some("v1".to_string()));

        storage.set_item("k", "v2").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), Some("v2".to_string()));

        storage.remove_item("k").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), None);

        // Removing a missing key is fine.
        storage.remove_item("k").await.unwrap();
    }
}
