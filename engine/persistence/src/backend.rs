//! Document store trait and implementations

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use crate::history::HistoryLog;
use crate::records::{
    validate_key, AccountId, HistoryEntry, MemberRecord, PaymentHistoryRecord, SessionRecord,
};
use cost_engine::{
    Coupon, CouponAssignment, CouponStatus, MonthKey, MonthlyRanking, PaidLedger, RankingEntry,
    RawFeeConfig,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Abstract trait for document store backends.
///
/// Every call is scoped by the account it acts for. Missing documents read
/// as `None` or as an empty collection, never as an error.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Initialize the store backend
    async fn initialize(&mut self) -> Result<()>;

    /// All sessions of an account, ordered by date then id
    async fn list_sessions(&self, account: &AccountId) -> Result<Vec<SessionRecord>>;

    async fn get_session(&self, account: &AccountId, session_id: &str)
        -> Result<Option<SessionRecord>>;

    async fn put_session(&self, account: &AccountId, session: &SessionRecord) -> Result<()>;

    async fn get_fee_config(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Option<RawFeeConfig>>;

    async fn put_fee_config(
        &self,
        account: &AccountId,
        session_id: &str,
        config: &RawFeeConfig,
    ) -> Result<()>;

    /// Paid flags keyed by player name
    async fn get_paid_ledger(&self, account: &AccountId, session_id: &str) -> Result<PaidLedger>;

    async fn put_paid_ledger(
        &self,
        account: &AccountId,
        session_id: &str,
        ledger: &PaidLedger,
    ) -> Result<()>;

    /// Coupon assignments of one session, in assignment order
    async fn get_assignments(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Vec<CouponAssignment>>;

    async fn put_assignments(
        &self,
        account: &AccountId,
        session_id: &str,
        assignments: &[CouponAssignment],
    ) -> Result<()>;

    /// Coupons of an account, optionally only those with `status`
    async fn list_coupons(
        &self,
        account: &AccountId,
        status: Option<CouponStatus>,
    ) -> Result<Vec<Coupon>>;

    async fn get_coupon(&self, account: &AccountId, coupon_id: &str) -> Result<Option<Coupon>>;

    /// Insert or replace a coupon by id
    async fn put_coupon(&self, account: &AccountId, coupon: &Coupon) -> Result<()>;

    async fn list_members(&self, account: &AccountId) -> Result<Vec<MemberRecord>>;

    /// Insert or replace a member by name
    async fn put_member(&self, account: &AccountId, member: &MemberRecord) -> Result<()>;

    /// Append a finalized session and return its sequence number
    async fn append_history(&self, account: &AccountId, record: PaymentHistoryRecord)
        -> Result<u64>;

    async fn read_history(&self, account: &AccountId) -> Result<Vec<HistoryEntry>>;

    async fn get_ranking(
        &self,
        account: &AccountId,
        month: MonthKey,
    ) -> Result<Option<MonthlyRanking>>;

    /// Add a session's `entries` to the stored month and return the merged
    /// aggregate. A session already counted in the month is not added again.
    async fn merge_ranking(
        &self,
        account: &AccountId,
        month: MonthKey,
        session_id: &str,
        entries: &BTreeMap<String, RankingEntry>,
    ) -> Result<MonthlyRanking>;

    /// Get the configuration
    fn config(&self) -> &PersistenceConfig;
}

fn not_initialized() -> PersistenceError {
    PersistenceError::invalid_operation("Document store not initialized")
}

fn upsert<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

/// Local JSON-file document store.
///
/// Layout under `data_dir/accounts/<account>/`: `sessions/`, `fees/`, `paid/`
/// and `assignments/` hold one `<session>.json` each; `coupons.json` and
/// `members.json` hold whole collections; `rankings/<MM-YYYY>.json` and the
/// history log complete the account.
pub struct LocalStore {
    config: PersistenceConfig,
    write_lock: Mutex<()>,
    initialized: bool,
}

const SESSIONS: &str = "sessions";
const FEES: &str = "fees";
const PAID: &str = "paid";
const ASSIGNMENTS: &str = "assignments";
const RANKINGS: &str = "rankings";
const COUPONS_FILE: &str = "coupons.json";
const MEMBERS_FILE: &str = "members.json";

impl LocalStore {
    /// Create a new local store backend
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        config.validate().map_err(PersistenceError::config)?;
        Ok(Self { config, write_lock: Mutex::new(()), initialized: false })
    }

    /// Create a new local store backend with default config
    pub fn with_default_config(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(PersistenceConfig::new(data_dir))
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }

    fn account_dir(&self, account: &AccountId) -> Result<PathBuf> {
        if !self.initialized {
            return Err(not_initialized());
        }
        Ok(self.config.accounts_dir().join(account.as_str()))
    }

    fn document(&self, account: &AccountId, collection: &str, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.account_dir(account)?.join(collection).join(format!("{key}.json")))
    }

    fn history_log(&self, account: &AccountId) -> Result<HistoryLog> {
        let path = self.account_dir(account)?.join(&self.config.history.file_name);
        Ok(HistoryLog::new(self.config.history.clone(), path))
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                PersistenceError::corruption(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Io(e)),
        }
    }

    /// Write through a temporary file so readers never see half a document
    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = if self.config.pretty_json {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = ?path, "Wrote document");
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for LocalStore {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        fs::create_dir_all(self.config.accounts_dir()).await?;
        self.initialized = true;

        info!("Local document store initialized at: {:?}", self.config.data_dir);

        Ok(())
    }

    async fn list_sessions(&self, account: &AccountId) -> Result<Vec<SessionRecord>> {
        let dir = self.account_dir(account)?.join(SESSIONS);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::Io(e)),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match Self::read_json::<SessionRecord>(&path).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable session document: {}", e),
            }
        }

        sessions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn get_session(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Option<SessionRecord>> {
        Self::read_json(&self.document(account, SESSIONS, session_id)?).await
    }

    async fn put_session(&self, account: &AccountId, session: &SessionRecord) -> Result<()> {
        let path = self.document(account, SESSIONS, &session.id)?;
        self.write_json(&path, session).await
    }

    async fn get_fee_config(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Option<RawFeeConfig>> {
        Self::read_json(&self.document(account, FEES, session_id)?).await
    }

    async fn put_fee_config(
        &self,
        account: &AccountId,
        session_id: &str,
        config: &RawFeeConfig,
    ) -> Result<()> {
        let path = self.document(account, FEES, session_id)?;
        self.write_json(&path, config).await
    }

    async fn get_paid_ledger(&self, account: &AccountId, session_id: &str) -> Result<PaidLedger> {
        let path = self.document(account, PAID, session_id)?;
        Ok(Self::read_json(&path).await?.unwrap_or_default())
    }

    async fn put_paid_ledger(
        &self,
        account: &AccountId,
        session_id: &str,
        ledger: &PaidLedger,
    ) -> Result<()> {
        let path = self.document(account, PAID, session_id)?;
        self.write_json(&path, ledger).await
    }

    async fn get_assignments(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Vec<CouponAssignment>> {
        let path = self.document(account, ASSIGNMENTS, session_id)?;
        Ok(Self::read_json(&path).await?.unwrap_or_default())
    }

    async fn put_assignments(
        &self,
        account: &AccountId,
        session_id: &str,
        assignments: &[CouponAssignment],
    ) -> Result<()> {
        let path = self.document(account, ASSIGNMENTS, session_id)?;
        self.write_json(&path, assignments).await
    }

    async fn list_coupons(
        &self,
        account: &AccountId,
        status: Option<CouponStatus>,
    ) -> Result<Vec<Coupon>> {
        let path = self.account_dir(account)?.join(COUPONS_FILE);
        let coupons: Vec<Coupon> = Self::read_json(&path).await?.unwrap_or_default();
        Ok(coupons.into_iter().filter(|c| status.map_or(true, |s| c.status == s)).collect())
    }

    async fn get_coupon(&self, account: &AccountId, coupon_id: &str) -> Result<Option<Coupon>> {
        Ok(self.list_coupons(account, None).await?.into_iter().find(|c| c.id == coupon_id))
    }

    async fn put_coupon(&self, account: &AccountId, coupon: &Coupon) -> Result<()> {
        validate_key(&coupon.id)?;
        let _guard = self.write_lock.lock().await;
        let path = self.account_dir(account)?.join(COUPONS_FILE);
        let mut coupons: Vec<Coupon> = Self::read_json(&path).await?.unwrap_or_default();
        upsert(&mut coupons, coupon.clone(), |c| c.id == coupon.id);
        self.write_json(&path, &coupons).await
    }

    async fn list_members(&self, account: &AccountId) -> Result<Vec<MemberRecord>> {
        let path = self.account_dir(account)?.join(MEMBERS_FILE);
        Ok(Self::read_json(&path).await?.unwrap_or_default())
    }

    async fn put_member(&self, account: &AccountId, member: &MemberRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.account_dir(account)?.join(MEMBERS_FILE);
        let mut members: Vec<MemberRecord> = Self::read_json(&path).await?.unwrap_or_default();
        upsert(&mut members, member.clone(), |m| m.name == member.name);
        self.write_json(&path, &members).await
    }

    async fn append_history(
        &self,
        account: &AccountId,
        record: PaymentHistoryRecord,
    ) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        self.history_log(account)?.append(record).await
    }

    async fn read_history(&self, account: &AccountId) -> Result<Vec<HistoryEntry>> {
        self.history_log(account)?.read_all().await
    }

    async fn get_ranking(
        &self,
        account: &AccountId,
        month: MonthKey,
    ) -> Result<Option<MonthlyRanking>> {
        Self::read_json(&self.document(account, RANKINGS, &month.to_string())?).await
    }

    async fn merge_ranking(
        &self,
        account: &AccountId,
        month: MonthKey,
        session_id: &str,
        entries: &BTreeMap<String, RankingEntry>,
    ) -> Result<MonthlyRanking> {
        let _guard = self.write_lock.lock().await;
        let path = self.document(account, RANKINGS, &month.to_string())?;
        let mut ranking =
            Self::read_json(&path).await?.unwrap_or_else(|| MonthlyRanking::new(month));
        if ranking.merge_session(session_id, entries) {
            self.write_json(&path, &ranking).await?;
        } else {
            debug!(session = session_id, %month, "Session already in ranking");
        }
        Ok(ranking)
    }

    fn config(&self) -> &PersistenceConfig {
        &self.config
    }
}

#[derive(Default)]
struct AccountDocuments {
    sessions: BTreeMap<String, SessionRecord>,
    fees: HashMap<String, RawFeeConfig>,
    paid: HashMap<String, PaidLedger>,
    assignments: HashMap<String, Vec<CouponAssignment>>,
    coupons: Vec<Coupon>,
    members: Vec<MemberRecord>,
    history: Vec<HistoryEntry>,
    rankings: BTreeMap<MonthKey, MonthlyRanking>,
}

/// Injected write failure: `allowed` writes pass, then writes fail with
/// `reason`, only once when `once` is set
struct WriteFailure {
    allowed: usize,
    reason: String,
    once: bool,
}

/// In-memory document store (for testing and dry runs)
pub struct InMemoryStore {
    config: PersistenceConfig,
    accounts: Arc<Mutex<HashMap<AccountId, AccountDocuments>>>,
    write_failure: Arc<Mutex<Option<WriteFailure>>>,
    initialized: bool,
}

impl InMemoryStore {
    /// Create a new in-memory store backend
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            accounts: Arc::new(Mutex::new(HashMap::new())),
            write_failure: Arc::new(Mutex::new(None)),
            initialized: false,
        }
    }

    /// Create a new in-memory store backend with default config
    pub fn with_default_config() -> Self {
        Self::new(PersistenceConfig::default())
    }

    /// Make every following write fail with `Unavailable(reason)`, or
    /// restore normal writes with `None`
    pub async fn fail_writes(&self, reason: Option<&str>) {
        *self.write_failure.lock().await = reason
            .map(|reason| WriteFailure { allowed: 0, reason: reason.to_string(), once: false });
    }

    /// Let the next `allowed` writes through, fail the one after with
    /// `Unavailable(reason)`, then write normally again
    pub async fn fail_write_after(&self, allowed: usize, reason: &str) {
        *self.write_failure.lock().await =
            Some(WriteFailure { allowed, reason: reason.to_string(), once: true });
    }

    async fn check_write(&self) -> Result<()> {
        if !self.initialized {
            return Err(not_initialized());
        }
        let mut injected = self.write_failure.lock().await;
        let Some(failure) = injected.as_mut() else {
            return Ok(());
        };
        if failure.allowed > 0 {
            failure.allowed -= 1;
            return Ok(());
        }
        let error = PersistenceError::unavailable(failure.reason.as_str());
        if failure.once {
            *injected = None;
        }
        Err(error)
    }

    /// Run `f` against the account's documents, creating them on first use
    async fn with_account<T>(
        &self,
        account: &AccountId,
        f: impl FnOnce(&mut AccountDocuments) -> T + Send,
    ) -> Result<T> {
        if !self.initialized {
            return Err(not_initialized());
        }
        let mut accounts = self.accounts.lock().await;
        Ok(f(accounts.entry(account.clone()).or_default()))
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryStore {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.initialized = true;

        info!("In-memory document store initialized");

        Ok(())
    }

    async fn list_sessions(&self, account: &AccountId) -> Result<Vec<SessionRecord>> {
        let mut sessions =
            self.with_account(account, |docs| docs.sessions.values().cloned().collect::<Vec<_>>())
                .await?;
        sessions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn get_session(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Option<SessionRecord>> {
        validate_key(session_id)?;
        self.with_account(account, |docs| docs.sessions.get(session_id).cloned()).await
    }

    async fn put_session(&self, account: &AccountId, session: &SessionRecord) -> Result<()> {
        validate_key(&session.id)?;
        self.check_write().await?;
        let session = session.clone();
        self.with_account(account, |docs| {
            docs.sessions.insert(session.id.clone(), session);
        })
        .await
    }

    async fn get_fee_config(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Option<RawFeeConfig>> {
        validate_key(session_id)?;
        self.with_account(account, |docs| docs.fees.get(session_id).cloned()).await
    }

    async fn put_fee_config(
        &self,
        account: &AccountId,
        session_id: &str,
        config: &RawFeeConfig,
    ) -> Result<()> {
        validate_key(session_id)?;
        self.check_write().await?;
        let config = config.clone();
        self.with_account(account, |docs| {
            docs.fees.insert(session_id.to_string(), config);
        })
        .await
    }

    async fn get_paid_ledger(&self, account: &AccountId, session_id: &str) -> Result<PaidLedger> {
        validate_key(session_id)?;
        self.with_account(account, |docs| docs.paid.get(session_id).cloned().unwrap_or_default())
            .await
    }

    async fn put_paid_ledger(
        &self,
        account: &AccountId,
        session_id: &str,
        ledger: &PaidLedger,
    ) -> Result<()> {
        validate_key(session_id)?;
        self.check_write().await?;
        let ledger = ledger.clone();
        self.with_account(account, |docs| {
            docs.paid.insert(session_id.to_string(), ledger);
        })
        .await
    }

    async fn get_assignments(
        &self,
        account: &AccountId,
        session_id: &str,
    ) -> Result<Vec<CouponAssignment>> {
        validate_key(session_id)?;
        self.with_account(account, |docs| {
            docs.assignments.get(session_id).cloned().unwrap_or_default()
        })
        .await
    }

    async fn put_assignments(
        &self,
        account: &AccountId,
        session_id: &str,
        assignments: &[CouponAssignment],
    ) -> Result<()> {
        validate_key(session_id)?;
        self.check_write().await?;
        let assignments = assignments.to_vec();
        self.with_account(account, |docs| {
            docs.assignments.insert(session_id.to_string(), assignments);
        })
        .await
    }

    async fn list_coupons(
        &self,
        account: &AccountId,
        status: Option<CouponStatus>,
    ) -> Result<Vec<Coupon>> {
        self.with_account(account, |docs| {
            docs.coupons
                .iter()
                .filter(|c| status.map_or(true, |s| c.status == s))
                .cloned()
                .collect()
        })
        .await
    }

    async fn get_coupon(&self, account: &AccountId, coupon_id: &str) -> Result<Option<Coupon>> {
        self.with_account(account, |docs| docs.coupons.iter().find(|c| c.id == coupon_id).cloned())
            .await
    }

    async fn put_coupon(&self, account: &AccountId, coupon: &Coupon) -> Result<()> {
        validate_key(&coupon.id)?;
        self.check_write().await?;
        let coupon = coupon.clone();
        self.with_account(account, |docs| {
            let id = coupon.id.clone();
            upsert(&mut docs.coupons, coupon, |c| c.id == id);
        })
        .await
    }

    async fn list_members(&self, account: &AccountId) -> Result<Vec<MemberRecord>> {
        self.with_account(account, |docs| docs.members.clone()).await
    }

    async fn put_member(&self, account: &AccountId, member: &MemberRecord) -> Result<()> {
        self.check_write().await?;
        let member = member.clone();
        self.with_account(account, |docs| {
            let name = member.name.clone();
            upsert(&mut docs.members, member, |m| m.name == name);
        })
        .await
    }

    async fn append_history(
        &self,
        account: &AccountId,
        record: PaymentHistoryRecord,
    ) -> Result<u64> {
        self.check_write().await?;
        self.with_account(account, |docs| {
            let sequence = docs.history.last().map(|e| e.sequence).unwrap_or(0) + 1;
            docs.history.push(HistoryEntry { sequence, record });
            sequence
        })
        .await
    }

    async fn read_history(&self, account: &AccountId) -> Result<Vec<HistoryEntry>> {
        self.with_account(account, |docs| docs.history.clone()).await
    }

    async fn get_ranking(
        &self,
        account: &AccountId,
        month: MonthKey,
    ) -> Result<Option<MonthlyRanking>> {
        self.with_account(account, |docs| docs.rankings.get(&month).cloned()).await
    }

    async fn merge_ranking(
        &self,
        account: &AccountId,
        month: MonthKey,
        session_id: &str,
        entries: &BTreeMap<String, RankingEntry>,
    ) -> Result<MonthlyRanking> {
        self.check_write().await?;
        self.with_account(account, |docs| {
            let ranking = docs.rankings.entry(month).or_insert_with(|| MonthlyRanking::new(month));
            ranking.merge_session(session_id, entries);
            ranking.clone()
        })
        .await
    }

    fn config(&self) -> &PersistenceConfig {
        &self.config
    }
}
