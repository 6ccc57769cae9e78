//! Store construction helpers

use crate::backend::{InMemoryStore, LocalStore};
use crate::config::PersistenceConfig;
use crate::error::Result;
use crate::kv::FileKv;

/// Create a new local store with default configuration
pub fn create_local_store(data_dir: impl Into<std::path::PathBuf>) -> Result<LocalStore> {
    LocalStore::with_default_config(data_dir)
}

/// Create a new local store with custom configuration
pub fn create_local_store_with_config(config: PersistenceConfig) -> Result<LocalStore> {
    LocalStore::new(config)
}

/// Create an in-memory store sharing the given configuration
pub fn create_in_memory_store(config: PersistenceConfig) -> InMemoryStore {
    InMemoryStore::new(config)
}

/// Draft storage next to the configured data directory
pub fn create_draft_store(config: &PersistenceConfig) -> FileKv {
    FileKv::new(config.drafts_dir())
}
