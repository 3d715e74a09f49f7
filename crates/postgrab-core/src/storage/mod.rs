//! Storage layer
//!
//! Persists each collection as one JSON document under a string key.
//!
//! ## Backends
//!
//! - **FileStore**: one `<key>.json` file per key, written atomically
//! - **MemoryStore**: in-process map, for tests and embedding
//!
//! The store engine only sees the [`KeyValueStore`] trait, so any backend
//! that can get and set byte blobs by key will do.

pub mod error;
pub mod file;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Namespaced byte-blob storage
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replace the value stored under `key`
    ///
    /// Readers must never observe a partially written value.
    fn set(&mut self, key: &str, value: &[u8]) -> StorageResult<()>;
}
