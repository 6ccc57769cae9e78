//! In-progress session state kept outside the document store

use crate::error::Result;
use chrono::{DateTime, Utc};
use cost_engine::{LiveSession, RawFeeConfig};
use persistence::{AccountId, KeyValueStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Live games and fee record for a session that is still being edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub account: AccountId,
    pub session_id: String,
    pub live: LiveSession,
    #[serde(default)]
    pub raw_config: RawFeeConfig,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionDraft {
    pub fn new(
        account: AccountId,
        session_id: impl Into<String>,
        live: LiveSession,
        raw_config: RawFeeConfig,
    ) -> Self {
        Self { account, session_id: session_id.into(), live, raw_config, saved_at: None }
    }

    /// `draft.<account>.<session>` with `%` and `.` escaped in both parts,
    /// so no two (account, session) pairs share a key
    pub fn key_for(account: &AccountId, session_id: &str) -> String {
        format!("draft.{}.{}", escape_part(account.as_str()), escape_part(session_id))
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.account, &self.session_id)
    }

    pub async fn save<K: KeyValueStore + ?Sized>(&mut self, kv: &K) -> Result<()> {
        self.saved_at = Some(Utc::now());
        let json = serde_json::to_string(self)?;
        kv.put(&self.key(), json).await?;
        debug!(key = %self.key(), games = self.live.games().len(), "Draft saved");
        Ok(())
    }

    pub async fn load<K: KeyValueStore + ?Sized>(
        kv: &K,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Option<Self>> {
        let Some(json) = kv.get(&Self::key_for(account, session_id)).await? else {
            return Ok(None);
        };
        let draft: Self = serde_json::from_str(&json)?;
        if &draft.account != account || draft.session_id != session_id {
            warn!(
                account = %account,
                session = session_id,
                stored_account = %draft.account,
                stored_session = %draft.session_id,
                "Stored draft belongs to another session, ignored"
            );
            return Ok(None);
        }
        Ok(Some(draft))
    }

    /// Drop the stored copy, returning whether one existed
    pub async fn discard<K: KeyValueStore + ?Sized>(&self, kv: &K) -> Result<bool> {
        Ok(kv.delete(&self.key()).await?)
    }
}

fn escape_part(part: &str) -> String {
    part.replace('%', "%25").replace('.', "%2E")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cost_engine::{Decimal, Game, GameResult, SessionStatus};
    use persistence::{FileKv, InMemoryKv};
    use tempfile::TempDir;

    fn draft() -> SessionDraft {
        let mut live = LiveSession::new();
        live.open().unwrap();
        live.add_game(Game::doubles(["Nok", "Bee"], ["Tan", "Pim"], 2, GameResult::TeamA))
            .unwrap();
        live.add_game(Game::doubles(["Nok", "Tan"], ["Bee", "Pim"], 1, GameResult::Unset))
            .unwrap();
        SessionDraft::new(
            AccountId::new("club-a").unwrap(),
            "s1",
            live,
            RawFeeConfig::new().with_shuttle_price(Decimal::from(5)),
        )
    }

    #[tokio::test]
    async fn test_save_load_discard() {
        let kv = InMemoryKv::new();
        let mut saved = draft();
        saved.save(&kv).await.unwrap();
        assert!(saved.saved_at.is_some());

        let loaded = SessionDraft::load(&kv, &saved.account, "s1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        // Tallies are rebuilt from the finished games on load
        assert_eq!(loaded.live.tally("Nok").map(|t| t.wins), Some(1));
        assert_eq!(loaded.live.status(), SessionStatus::Open);

        assert!(loaded.discard(&kv).await.unwrap());
        assert!(SessionDraft::load(&kv, &saved.account, "s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dotted_ids_do_not_share_drafts() {
        let kv = InMemoryKv::new();
        let mut other = draft();
        other.account = AccountId::new("club.a").unwrap();
        other.session_id = "x".to_string();
        other.save(&kv).await.unwrap();

        let club = AccountId::new("club").unwrap();
        assert_ne!(SessionDraft::key_for(&club, "a.x"), other.key());
        assert!(SessionDraft::load(&kv, &club, "a.x").await.unwrap().is_none());
        assert!(SessionDraft::load(&kv, &other.account, "x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_load_ignores_draft_of_another_account() {
        let kv = InMemoryKv::new();
        let mut foreign = draft();
        foreign.account = AccountId::new("club-b").unwrap();
        let club_a = AccountId::new("club-a").unwrap();
        let json = serde_json::to_string(&foreign).unwrap();
        kv.put(&SessionDraft::key_for(&club_a, "s1"), json).await.unwrap();

        assert!(SessionDraft::load(&kv, &club_a, "s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backed_drafts_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut saved = draft();
        saved.save(&FileKv::new(temp_dir.path())).await.unwrap();

        let reopened = FileKv::new(temp_dir.path());
        let loaded = SessionDraft::load(&reopened, &saved.account, "s1").await.unwrap();
        assert_eq!(loaded.map(|d| d.live.games().len()), Some(2));
    }
}
