//! In-memory secret storage implementation.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Secret, SecretStore, StoreError};

/// In-memory secret store for tests and ephemeral sessions.
///
/// This store is not persistent; data is lost when the process exits.
pub struct MemoryStore {
    data: RwLock<HashMap<String, Secret>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a memory store with initial data.
    pub fn with_data(data: HashMap<String, Secret>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys_count", &self.data.read().len())
            .finish()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        self.data.write().insert(key.to_string(), secret.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_set_get() {
        let store = MemoryStore::new();
        store.set("test-key", &Secret::new("test-value")).unwrap();

        let retrieved = store.get("test-key").unwrap();
        assert_eq!(retrieved.unwrap().expose(), "test-value");
    }

    #[test]
    fn test_memory_store_get_nonexistent() {
        let store = MemoryStore::new();
        assert!(store.get("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("test-key", &Secret::new("test-value")).unwrap();

        store.delete("test-key").unwrap();
        store.delete("test-key").unwrap();

        assert!(store.get("test-key").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_keys_are_independent() {
        let store = MemoryStore::new();
        store
            .set("wealthpulse/access_token", &Secret::new("a"))
            .unwrap();
        store
            .set("wealthpulse/refresh_token", &Secret::new("r"))
            .unwrap();

        store.delete("wealthpulse/access_token").unwrap();

        assert!(store.get("wealthpulse/access_token").unwrap().is_none());
        assert_eq!(
            store.get("wealthpulse/refresh_token").unwrap().unwrap().expose(),
            "r"
        );
    }
}
