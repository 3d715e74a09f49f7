//! In-memory key-value store

use std::collections::HashMap;

use super::error::StorageResult;
use super::KeyValueStore;

/// Map-backed store; contents vanish with the value
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing any validation
    pub fn with_entry(mut self, key: &str, value: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
