//! Small key-value store for documents that live outside an account,
//! such as in-progress session drafts

use crate::error::{PersistenceError, Result};
use crate::records::validate_key;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: String) -> Result<()>;

    /// Remove a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

#[derive(Default)]
pub struct InMemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        validate_key(key)?;
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.entries.lock().await.remove(key).is_some())
    }
}

/// One file per key under a directory
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)?).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Io(e)),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let path = self.path(key)?;
        fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path(key)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistenceError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn exercise(kv: &dyn KeyValueStore) {
        assert_eq!(kv.get("draft-a").await.unwrap(), None);

        kv.put("draft-a", "{\"v\":1}".to_string()).await.unwrap();
        kv.put("draft-a", "{\"v\":2}".to_string()).await.unwrap();
        assert_eq!(kv.get("draft-a").await.unwrap().as_deref(), Some("{\"v\":2}"));

        assert!(kv.delete("draft-a").await.unwrap());
        assert!(!kv.delete("draft-a").await.unwrap());
        assert_eq!(kv.get("draft-a").await.unwrap(), None);

        assert!(kv.put("../escape", String::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_kv() {
        exercise(&InMemoryKv::new()).await;
    }

    #[tokio::test]
    async fn test_file_kv() {
        let temp_dir = TempDir::new().unwrap();
        let kv = FileKv::new(temp_dir.path().join("drafts"));
        exercise(&kv).await;
        assert!(kv.dir().exists());
    }
}
