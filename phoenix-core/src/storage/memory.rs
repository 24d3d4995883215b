/*!
In-memory storage adapter.
*/

use std::collections::HashMap;
use std::sync::Mutex;

use super::StorageAdapter;
use crate::{PhoenixError, Result};

/// Memory-based storage adapter
///
/// Values live in a `HashMap` for the lifetime of the adapter. Useful for tests
/// and for stores whose persistence only needs to survive a store rebuild
/// within one process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an adapter pre-populated with `key` → `value`
    pub fn with_item<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        let storage = Self::new();
        if let Ok(mut data) = storage.data.lock() {
            data.insert(key.into(), value.into());
        }
        storage
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.lock().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageAdapter for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let data = self
            .data
            .lock()
            .map_err(|e| PhoenixError::storage(format!("Memory storage poisoned: {e}")))?;
        Ok(data.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| PhoenixError::storage(format!("Memory storage poisoned: {e}")))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());
        assert_eq!(storage.get_item("redux").unwrap(), None);

        storage.set_item("redux", "first").unwrap();
        storage.set_item("redux", "second").unwrap();

        assert_eq!(storage.get_item("redux").unwrap(), Some("second".to_string()));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_with_item() {
        let storage = MemoryStorage::with_item("settings", "{}");
        assert_eq!(storage.get_item("settings").unwrap(), Some("{}".to_string()));
        assert_eq!(storage.get_item("other").unwrap(), None);
    }
}
