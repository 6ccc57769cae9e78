//! # Persistence Layer
//!
//! This crate provides the document store behind the club ledger. Every
//! document is scoped by an [`AccountId`]; finalized sessions go to an
//! append-only payment history log.
//!
//! ## Architecture
//!
//! - **DocumentStore**: Abstract trait for the store backends
//! - **LocalStore**: JSON documents on the local file system
//! - **InMemoryStore**: Process-local maps for tests and dry runs
//! - **HistoryLog**: Append-only JSON-lines payment history
//! - **KeyValueStore**: Loose key/value documents such as session drafts
//!
//! ## Usage
//!
//! ```rust
//! use persistence::{create_local_store, AccountId, DocumentStore, SessionRecord};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let mut store = create_local_store(temp_dir.path())?;
//!     store.initialize().await?;
//!
//!     let account = AccountId::new("club-a")?;
//!     store.put_session(&account, &SessionRecord::new("s1", "Friday night")).await?;
//!     assert!(store.get_session(&account, "s1").await?.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod history;
pub mod kv;
pub mod local;
pub mod records;

pub use backend::{DocumentStore, InMemoryStore, LocalStore};
pub use config::{BackendKind, HistoryConfig, PersistenceConfig};
pub use error::{PersistenceError, Result};
pub use history::HistoryLog;
pub use kv::{FileKv, InMemoryKv, KeyValueStore};
pub use local::{
    create_draft_store, create_in_memory_store, create_local_store, create_local_store_with_config,
};
pub use records::{
    validate_key, AccountId, HistoryEntry, MemberRecord, PaymentHistoryRecord, SessionRecord,
};

pub use chrono::{DateTime, NaiveDate, Utc};
pub use uuid::Uuid;
