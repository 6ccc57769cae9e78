//! Configuration for the persistence layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which document store implementation to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local maps, lost on exit
    Memory,
    /// JSON documents under `data_dir`
    #[default]
    Local,
}

/// Configuration for the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Base directory for persistence files
    pub data_dir: PathBuf,

    /// Store implementation
    pub backend: BackendKind,

    /// Write documents indented
    pub pretty_json: bool,

    /// Payment history log configuration
    pub history: HistoryConfig,
}

/// Append-only payment history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether to fsync on every append (for maximum durability)
    pub fsync_every_write: bool,

    /// File name of the per-account history log
    pub file_name: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            backend: BackendKind::default(),
            pretty_json: true,
            history: HistoryConfig::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { fsync_every_write: true, file_name: "history.jsonl".to_string() }
    }
}

impl PersistenceConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Root of every account's documents
    pub fn accounts_dir(&self) -> PathBuf {
        self.data_dir.join("accounts")
    }

    /// Directory used by the file-backed key-value store
    pub fn drafts_dir(&self) -> PathBuf {
        self.data_dir.join("drafts")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }

        let name = self.history.file_name.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(format!("history file_name {name:?} must be a plain file name"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PersistenceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.accounts_dir(), PathBuf::from("./data/accounts"));
    }

    #[test]
    fn test_rejects_nested_history_file() {
        let mut config = PersistenceConfig::new("/tmp/club");
        config.history.file_name = "../history.jsonl".to_string();
        assert!(config.validate().is_err());

        config.history.file_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_kind_from_toml_style_string() {
        let kind: BackendKind = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(kind, BackendKind::Memory);
    }
}
