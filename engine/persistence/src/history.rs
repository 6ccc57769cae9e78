//! Append-only payment history log
//!
//! Every finalized session is appended as one JSON line. Lines are never
//! rewritten; the sequence number continues from the highest one on disk.

use crate::config::HistoryConfig;
use crate::error::{PersistenceError, Result};
use crate::records::{HistoryEntry, PaymentHistoryRecord};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// History log for one account
pub struct HistoryLog {
    config: HistoryConfig,
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(config: HistoryConfig, path: PathBuf) -> Self {
        Self { config, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record and return its sequence number
    pub async fn append(&self, record: PaymentHistoryRecord) -> Result<u64> {
        let sequence = self.highest_sequence().await? + 1;
        let entry = HistoryEntry { sequence, record };
        let json = serde_json::to_string(&entry).map_err(PersistenceError::Serialization)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(format!("{json}\n").as_bytes()).await?;
        file.flush().await?;
        if self.config.fsync_every_write {
            file.sync_all().await?;
        }

        debug!(sequence, path = ?self.path, "Appended payment history entry");
        Ok(sequence)
    }

    /// Read every entry in sequence order, skipping lines that do not parse
    pub async fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::Io(e)),
        };

        let mut entries = parse_lines(&content, &self.path);
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    async fn highest_sequence(&self) -> Result<u64> {
        Ok(self.read_all().await?.last().map(|e| e.sequence).unwrap_or(0))
    }
}

fn parse_lines(content: &str, path: &Path) -> Vec<HistoryEntry> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(number, line)| match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable history line {} in {:?}: {}", number + 1, path, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SessionRecord;
    use cost_engine::SessionSummary;
    use tempfile::TempDir;

    fn record(session_id: &str) -> PaymentHistoryRecord {
        PaymentHistoryRecord::from_summary(
            &SessionRecord::new(session_id, "Friday"),
            &SessionSummary::empty(),
        )
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_sequences() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::new(HistoryConfig::default(), temp_dir.path().join("history.jsonl"));

        assert_eq!(log.append(record("s1")).await.unwrap(), 1);
        assert_eq!(log.append(record("s2")).await.unwrap(), 2);

        let entries = log.read_all().await.unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.record.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_sequence_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.jsonl");

        HistoryLog::new(HistoryConfig::default(), path.clone()).append(record("s1")).await.unwrap();
        let reopened = HistoryLog::new(HistoryConfig::default(), path);
        assert_eq!(reopened.append(record("s2")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        let log = HistoryLog::new(HistoryConfig::default(), path.clone());
        log.append(record("s1")).await.unwrap();

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{not json\n\n");
        std::fs::write(&path, content).unwrap();
        log.append(record("s2")).await.unwrap();

        let entries = log.read_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, 2);
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::new(HistoryConfig::default(), temp_dir.path().join("none.jsonl"));
        assert!(log.read_all().await.unwrap().is_empty());
    }
}
