//! Reports built from the payment history

use chrono::NaiveDate;
use cost_engine::{Decimal, MonthKey, MonthlyRanking, PlayerSummary};
use persistence::PaymentHistoryRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Money collected in one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyIncome {
    pub month: MonthKey,
    pub sessions: usize,
    pub collected: Decimal,
    pub players: BTreeSet<String>,
}

/// One session as seen by one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerHistoryRow {
    pub date: NaiveDate,
    pub session_id: String,
    pub session_name: String,
    pub summary: PlayerSummary,
}

/// Records that carry a date; the rest are logged and left out
fn dated(
    records: &[PaymentHistoryRecord],
) -> impl Iterator<Item = (NaiveDate, &PaymentHistoryRecord)> {
    records.iter().filter_map(|record| match record.date {
        Some(date) => Some((date, record)),
        None => {
            warn!(
                session = %record.session_id,
                record = %record.id,
                "History record has no date, skipped in reports"
            );
            None
        }
    })
}

pub fn monthly_income(records: &[PaymentHistoryRecord]) -> BTreeMap<MonthKey, MonthlyIncome> {
    let mut months: BTreeMap<MonthKey, MonthlyIncome> = BTreeMap::new();
    for (date, record) in dated(records) {
        let month = MonthKey::from_date(date);
        let income = months.entry(month).or_insert_with(|| MonthlyIncome {
            month,
            sessions: 0,
            collected: Decimal::ZERO,
            players: BTreeSet::new(),
        });
        income.sessions += 1;
        income.collected += record.grand_total;
        income.players.extend(record.players.iter().map(|p| p.name.clone()));
    }
    months
}

/// Monthly rankings recomputed from stored player summaries
pub fn rebuild_rankings(records: &[PaymentHistoryRecord]) -> BTreeMap<MonthKey, MonthlyRanking> {
    let mut rankings: BTreeMap<MonthKey, MonthlyRanking> = BTreeMap::new();
    for (date, record) in dated(records) {
        let month = MonthKey::from_date(date);
        let entries = MonthlyRanking::entries_for(&record.players);
        let ranking = rankings.entry(month).or_insert_with(|| MonthlyRanking::new(month));
        if !ranking.merge_session(&record.session_id, &entries) {
            warn!(session = %record.session_id, "Session recorded twice in history, counted once");
        }
    }
    rankings
}

/// Every session `name` played in, oldest first
pub fn player_history(records: &[PaymentHistoryRecord], name: &str) -> Vec<PlayerHistoryRow> {
    let name = name.trim();
    let mut rows: Vec<PlayerHistoryRow> = dated(records)
        .filter_map(|(date, record)| {
            record.players.iter().find(|p| p.name == name).map(|summary| PlayerHistoryRow {
                date,
                session_id: record.session_id.clone(),
                session_name: record.session_name.clone(),
                summary: summary.clone(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.session_id.cmp(&b.session_id)));
    rows
}
