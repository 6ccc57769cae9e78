//! Monthly ranking aggregate, keyed by `MM-YYYY`

use crate::types::{PlayerSummary, Tally};
use crate::{DRAW_SCORE, WIN_SCORE};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Calendar month a ranking aggregate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl Ord for MonthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month).cmp(&(other.year, other.month))
    }
}

impl PartialOrd for MonthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid month key {s:?}, expected MM-YYYY");
        let (month, year) = s.trim().split_once('-').ok_or_else(invalid)?;
        if month.len() != 2 || year.len() != 4 {
            return Err(invalid());
        }
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// Cumulative figures for one player in one month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub games_played: u32,
    pub wins: u32,
    pub score: u32,
}

impl RankingEntry {
    pub fn merge(&mut self, other: RankingEntry) {
        self.games_played = self.games_played.saturating_add(other.games_played);
        self.wins = self.wins.saturating_add(other.wins);
        self.score = self.score.saturating_add(other.score);
    }

    /// Draws implied by the score, assuming a win is worth
    /// [`WIN_SCORE`] and a draw [`DRAW_SCORE`]
    pub fn draws(&self) -> u32 {
        self.score.saturating_sub(self.wins * WIN_SCORE) / DRAW_SCORE
    }

    /// Games neither won nor drawn. Unset games land here too.
    pub fn losses(&self) -> u32 {
        self.games_played.saturating_sub(self.wins).saturating_sub(self.draws())
    }
}

impl From<Tally> for RankingEntry {
    fn from(tally: Tally) -> Self {
        Self { games_played: tally.games_played, wins: tally.wins, score: tally.score }
    }
}

/// Ranking aggregate for one month, merged across sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRanking {
    pub month: MonthKey,
    #[serde(default)]
    pub entries: BTreeMap<String, RankingEntry>,
    /// Sessions already counted in `entries`
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub sessions: BTreeSet<String>,
}

impl MonthlyRanking {
    pub fn new(month: MonthKey) -> Self {
        Self { month, entries: BTreeMap::new(), sessions: BTreeSet::new() }
    }

    /// Merge a session's entries once; returns false when `session_id`
    /// was already counted and nothing changed
    pub fn merge_session(
        &mut self,
        session_id: &str,
        entries: &BTreeMap<String, RankingEntry>,
    ) -> bool {
        if !self.sessions.insert(session_id.to_string()) {
            return false;
        }
        self.merge_entries(entries);
        true
    }

    pub fn merge_entries(&mut self, entries: &BTreeMap<String, RankingEntry>) {
        for (name, entry) in entries {
            self.merge_entry(name, *entry);
        }
    }

    pub fn merge_entry(&mut self, name: &str, entry: RankingEntry) {
        self.entries.entry(name.to_string()).or_default().merge(entry);
    }

    /// Entries for a session's players, ready to be merged into the stored aggregate
    pub fn entries_for<'a>(
        players: impl IntoIterator<Item = &'a PlayerSummary>,
    ) -> BTreeMap<String, RankingEntry> {
        players.into_iter().map(|p| (p.name.clone(), p.tally().into())).collect()
    }

    /// Players ordered by score, then wins, then name
    pub fn standings(&self) -> Vec<(&str, &RankingEntry)> {
        let mut standings: Vec<(&str, &RankingEntry)> =
            self.entries.iter().map(|(name, entry)| (name.as_str(), entry)).collect();
        standings.sort_by(|(a_name, a), (b_name, b)| {
            b.score.cmp(&a.score).then(b.wins.cmp(&a.wins)).then(a_name.cmp(b_name))
        });
        standings
    }
}
