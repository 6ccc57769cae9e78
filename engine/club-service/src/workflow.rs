//! Session workflow: load, recompute, coupon and paid edits, finalize
//!
//! Store calls are awaited one after another. Edits are applied locally
//! first; when the store write fails the local change is undone before
//! the error is returned.

use crate::draft::SessionDraft;
use crate::error::{Result, ServiceError};
use cost_engine::{
    compute_summaries, ConfigError, Coupon, CouponAssignment, CouponBook, Game, LiveSession,
    MonthKey, MonthlyRanking, PaidLedger, RawFeeConfig, SessionConfig, SessionStatus,
    SessionSummary,
};
use persistence::{AccountId, DocumentStore, MemberRecord, PaymentHistoryRecord, SessionRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why the summary is being rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeTrigger {
    SessionLoaded,
    ConfigChanged,
    CouponsChanged,
    GamesChanged,
    Manual,
}

impl fmt::Display for RecomputeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecomputeTrigger::SessionLoaded => "session_loaded",
            RecomputeTrigger::ConfigChanged => "config_changed",
            RecomputeTrigger::CouponsChanged => "coupons_changed",
            RecomputeTrigger::GamesChanged => "games_changed",
            RecomputeTrigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// What `finalize` wrote
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub sequence: u64,
    pub record: PaymentHistoryRecord,
    pub ranking: MonthlyRanking,
}

/// One session of one account, with its derived summary
pub struct SessionWorkflow<S: DocumentStore> {
    store: Arc<S>,
    account: AccountId,
    session: SessionRecord,
    raw_config: RawFeeConfig,
    paid: PaidLedger,
    coupons: CouponBook,
    summary: SessionSummary,
}

impl<S: DocumentStore> SessionWorkflow<S> {
    /// Read the session and everything priced against it, then compute
    pub async fn load(store: Arc<S>, account: AccountId, session_id: &str) -> Result<Self> {
        let session = store
            .get_session(&account, session_id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;
        let raw_config = store.get_fee_config(&account, session_id).await?.unwrap_or_default();
        let paid = store.get_paid_ledger(&account, session_id).await?;
        let assignments = store.get_assignments(&account, session_id).await?;

        let mut coupons = CouponBook::new();
        for assignment in assignments {
            let coupon_id = assignment.coupon_id.clone();
            if let Err(e) = coupons.insert(assignment) {
                warn!(
                    session = session_id,
                    coupon = %coupon_id,
                    "Ignoring stored assignment: {}",
                    e
                );
            }
        }

        let mut workflow = Self {
            store,
            account,
            session,
            raw_config,
            paid,
            coupons,
            summary: SessionSummary::empty(),
        };
        workflow.recompute(RecomputeTrigger::SessionLoaded);
        info!(
            session = %workflow.session.id,
            players = workflow.summary.len(),
            "Session loaded"
        );
        Ok(workflow)
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn session(&self) -> &SessionRecord {
        &self.session
    }

    pub fn raw_config(&self) -> &RawFeeConfig {
        &self.raw_config
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn assignments(&self) -> &[CouponAssignment] {
        self.coupons.assignments()
    }

    pub fn paid_ledger(&self) -> &PaidLedger {
        &self.paid
    }

    /// Rebuild the summary from scratch
    pub fn recompute(&mut self, trigger: RecomputeTrigger) -> &SessionSummary {
        self.summary = compute_summaries(
            &self.session.games,
            &self.raw_config,
            self.coupons.assignments(),
            &self.paid,
            &self.session.pre_settled,
        );
        debug!(
            %trigger,
            session = %self.session.id,
            players = self.summary.len(),
            grand_total = %self.summary.grand_total(),
            "Recomputed session summary"
        );
        &self.summary
    }

    /// Parse the current fee record, for showing which field is wrong
    pub fn validated_config(&self) -> std::result::Result<SessionConfig, ConfigError> {
        SessionConfig::parse(&self.raw_config)
    }

    pub async fn update_fee_config(&mut self, raw: RawFeeConfig) -> Result<()> {
        self.ensure_editable()?;
        self.store.put_fee_config(&self.account, &self.session.id, &raw).await?;
        self.raw_config = raw;
        if let Err(e) = self.validated_config() {
            info!(session = %self.session.id, "Fee configuration saved but not usable yet: {}", e);
        }
        self.recompute(RecomputeTrigger::ConfigChanged);
        Ok(())
    }

    /// Give an active coupon to a member of this session
    pub async fn assign_coupon(&mut self, coupon_id: &str, member: &str) -> Result<()> {
        self.ensure_editable()?;
        let original = self
            .store
            .get_coupon(&self.account, coupon_id)
            .await?
            .ok_or_else(|| ServiceError::CouponNotFound(coupon_id.to_string()))?;

        let member_name = self.coupons.add(&original, member)?.member_name.clone();
        let index = self.coupons.len() - 1;

        let mut redeemed = original.clone();
        redeemed.redeem(&member_name, &self.session.id);

        if let Err(e) = self.persist_coupon_change(&redeemed, &original).await {
            warn!(
                coupon = coupon_id,
                member = %member_name,
                "Rolling back coupon assignment: {}",
                e
            );
            let _ = self.coupons.remove(index);
            return Err(e);
        }

        info!(coupon = coupon_id, member = %member_name, "Coupon assigned");
        self.recompute(RecomputeTrigger::CouponsChanged);
        Ok(())
    }

    /// Take back the assignment at `index` and reactivate its coupon
    pub async fn remove_coupon(&mut self, index: usize) -> Result<CouponAssignment> {
        self.ensure_editable()?;
        let removed = self.coupons.remove(index)?;

        let result = match self.store.get_coupon(&self.account, &removed.coupon_id).await {
            Ok(Some(original)) => {
                let mut released = original.clone();
                released.release();
                self.persist_coupon_change(&released, &original).await
            }
            Ok(None) => {
                warn!(
                    coupon = %removed.coupon_id,
                    "Coupon missing from store, only the assignment is removed"
                );
                self.persist_assignments().await
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            warn!(coupon = %removed.coupon_id, "Rolling back coupon removal: {}", e);
            self.coupons.restore(index, removed);
            return Err(e);
        }

        info!(coupon = %removed.coupon_id, member = %removed.member_name, "Coupon removed");
        self.recompute(RecomputeTrigger::CouponsChanged);
        Ok(removed)
    }

    /// Flip a player's paid flag and return the new value
    pub async fn toggle_paid(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        let paid = self
            .summary
            .toggle_paid(name)
            .ok_or_else(|| ServiceError::PlayerNotFound(name.to_string()))?;
        let previous = self.paid.insert(name.to_string(), paid);

        let written = self.store.put_paid_ledger(&self.account, &self.session.id, &self.paid).await;
        if let Err(e) = written {
            warn!(player = name, "Rolling back paid toggle: {}", e);
            self.summary.set_paid(name, !paid);
            match previous {
                Some(value) => self.paid.insert(name.to_string(), value),
                None => self.paid.remove(name),
            };
            return Err(e.into());
        }

        info!(player = name, paid, "Paid flag updated");
        Ok(paid)
    }

    /// Store a new game list and recompute
    pub async fn replace_games(&mut self, games: Vec<Game>) -> Result<()> {
        self.ensure_editable()?;
        let mut updated = self.session.clone();
        updated.games = games;
        self.store.put_session(&self.account, &updated).await?;
        self.session = updated;
        self.recompute(RecomputeTrigger::GamesChanged);
        Ok(())
    }

    /// Start a live draft from the stored games and fees
    pub fn draft(&self) -> SessionDraft {
        let status = match self.session.status {
            SessionStatus::Closed => SessionStatus::Closed,
            _ => SessionStatus::Open,
        };
        SessionDraft::new(
            self.account.clone(),
            self.session.id.clone(),
            LiveSession::from_games(status, self.session.games.clone()),
            self.raw_config.clone(),
        )
    }

    /// Write a draft's games and fee record back as the session's own.
    ///
    /// When the game write fails after the fee record changed, the previous
    /// fee record is written back.
    pub async fn apply_draft(&mut self, draft: SessionDraft) -> Result<()> {
        if draft.session_id != self.session.id || draft.account != self.account {
            return Err(ServiceError::SessionNotFound(draft.session_id));
        }
        let previous = self.raw_config.clone();
        let fees_changed = draft.raw_config != previous;
        if fees_changed {
            self.update_fee_config(draft.raw_config).await?;
        }
        let Err(e) = self.replace_games(draft.live.into_games()).await else {
            return Ok(());
        };
        if fees_changed {
            warn!(
                session = %self.session.id,
                "Restoring fee record after failed game write: {}",
                e
            );
            let restored =
                self.store.put_fee_config(&self.account, &self.session.id, &previous).await;
            match restored {
                Ok(()) => {
                    self.raw_config = previous;
                    self.recompute(RecomputeTrigger::ConfigChanged);
                }
                Err(restore) => {
                    warn!(session = %self.session.id, "Fee record not restored: {}", restore)
                }
            }
        }
        Err(e)
    }

    /// Close a draft's live session, then store it like `apply_draft`.
    ///
    /// Fails while any game lacks a result or the fee record does not parse.
    pub async fn close_draft(&mut self, mut draft: SessionDraft) -> Result<SessionConfig> {
        self.ensure_editable()?;
        let config = draft.live.close(&draft.raw_config)?;
        self.apply_draft(draft).await?;
        Ok(config)
    }

    /// Append the session to the payment history, merge its month's
    /// ranking, and close it
    pub async fn finalize(&mut self) -> Result<FinalizeOutcome> {
        self.ensure_editable()?;
        if self.summary.is_empty() {
            return Err(ServiceError::NothingToFinalize(self.session.id.clone()));
        }
        let date = self
            .session
            .date
            .ok_or_else(|| ServiceError::MissingSessionDate(self.session.id.clone()))?;
        let month = MonthKey::from_date(date);

        // A retry after a partial finalize reuses the history entry already written
        let recorded = self
            .store
            .read_history(&self.account)
            .await?
            .into_iter()
            .find(|entry| entry.record.session_id == self.session.id);
        let (sequence, record) = match recorded {
            Some(entry) => {
                warn!(
                    session = %self.session.id,
                    sequence = entry.sequence,
                    "Session already in payment history, resuming finalize"
                );
                (entry.sequence, entry.record)
            }
            None => {
                let record = PaymentHistoryRecord::from_summary(&self.session, &self.summary);
                (self.store.append_history(&self.account, record.clone()).await?, record)
            }
        };
        let entries = MonthlyRanking::entries_for(&record.players);
        let ranking =
            self.store.merge_ranking(&self.account, month, &self.session.id, &entries).await?;

        let mut closed = self.session.clone();
        closed.status = SessionStatus::Closed;
        self.store.put_session(&self.account, &closed).await?;
        self.session = closed;

        info!(
            session = %self.session.id,
            %month,
            sequence,
            grand_total = %record.grand_total,
            "Session finalized"
        );
        Ok(FinalizeOutcome { sequence, record, ranking })
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.session.status {
            SessionStatus::Closed => Err(ServiceError::SessionClosed(self.session.id.clone())),
            _ => Ok(()),
        }
    }

    async fn persist_assignments(&self) -> Result<()> {
        self.store
            .put_assignments(&self.account, &self.session.id, self.coupons.assignments())
            .await?;
        Ok(())
    }

    /// Write the coupon, then the assignment list. If the list fails the
    /// coupon is put back as it was.
    async fn persist_coupon_change(&self, updated: &Coupon, original: &Coupon) -> Result<()> {
        self.store.put_coupon(&self.account, updated).await?;
        if let Err(e) = self.persist_assignments().await {
            if let Err(restore) = self.store.put_coupon(&self.account, original).await {
                warn!(coupon = %original.id, "Could not restore coupon status: {}", restore);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Session file accepted by `import-session`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionImport {
    pub session: SessionRecord,
    #[serde(default)]
    pub fees: Option<RawFeeConfig>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
}

/// Store an imported session and add unseen players to the roster.
///
/// Returns the number of members added.
pub async fn import_session<S: DocumentStore + ?Sized>(
    store: &S,
    account: &AccountId,
    import: SessionImport,
) -> Result<usize> {
    store.put_session(account, &import.session).await?;
    if let Some(fees) = &import.fees {
        store.put_fee_config(account, &import.session.id, fees).await?;
    }

    let known: BTreeSet<String> =
        store.list_members(account).await?.into_iter().map(|m| m.name).collect();
    let mut added = 0;
    for member in roster_candidates(&import) {
        if known.contains(&member.name) {
            continue;
        }
        store.put_member(account, &member).await?;
        added += 1;
    }

    info!(
        session = %import.session.id,
        games = import.session.games.len(),
        added,
        "Session imported"
    );
    Ok(added)
}

/// Listed members first, then every named player in game order
fn roster_candidates(import: &SessionImport) -> Vec<MemberRecord> {
    let mut seen = BTreeSet::new();
    let listed = import.members.iter().cloned();
    let played = import.session.games.iter().flat_map(|game| {
        game.players().into_iter().filter_map(|(_, entry)| {
            entry.player_name().map(|name| MemberRecord {
                name: name.to_string(),
                level: game.level_of(name).map(str::to_string),
            })
        })
    });
    listed.chain(played).filter(|m| seen.insert(m.name.clone())).collect()
}
