//! Documents kept by the store

use crate::error::{PersistenceError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use cost_engine::{Decimal, Game, MonthKey, PlayerSummary, SessionStatus, SessionSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reject keys that would escape their directory or collide with
/// the store's own file naming
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(PersistenceError::invalid_key(key, "key is empty"));
    }
    if key.contains(['/', '\\']) {
        return Err(PersistenceError::invalid_key(key, "key contains a path separator"));
    }
    if key.contains("..") {
        return Err(PersistenceError::invalid_key(key, "key contains `..`"));
    }
    if key.chars().any(char::is_control) {
        return Err(PersistenceError::invalid_key(key, "key contains a control character"));
    }
    Ok(())
}

/// Account that scopes every store call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_key(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = PersistenceError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// One organized gathering and the games played in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub games: Vec<Game>,
    /// Players who settled outside the ledger
    #[serde(default)]
    pub pre_settled: Vec<String>,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            date: None,
            status: SessionStatus::NotStarted,
            games: Vec::new(),
            pre_settled: Vec::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_games(mut self, games: Vec<Game>) -> Self {
        self.games = games;
        self
    }
}

/// Club roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// Finalized session as written to the payment history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryRecord {
    pub id: Uuid,
    pub session_id: String,
    pub session_name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub recorded_at: DateTime<Utc>,
    pub players: Vec<PlayerSummary>,
    pub grand_total: Decimal,
}

impl PaymentHistoryRecord {
    pub fn from_summary(session: &SessionRecord, summary: &SessionSummary) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session.id.clone(),
            session_name: session.name.clone(),
            date: session.date,
            recorded_at: Utc::now(),
            players: summary.players().cloned().collect(),
            grand_total: summary.grand_total(),
        }
    }

    pub fn month(&self) -> Option<MonthKey> {
        self.date.map(MonthKey::from_date)
    }
}

/// A history record with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub sequence: u64,
    pub record: PaymentHistoryRecord,
}
