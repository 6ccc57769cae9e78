//! Core types shared by the engine, the store and the workflow layer

use crate::{DRAW_SCORE, WIN_SCORE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Paid flags keyed by player name
pub type PaidLedger = BTreeMap<String, bool>;

/// Side of the net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

/// One of the four player positions in a doubles game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    A1,
    A2,
    B1,
    B2,
}

impl Slot {
    /// Slot order used for discovery and level assignment
    pub const ALL: [Slot; 4] = [Slot::A1, Slot::A2, Slot::B1, Slot::B2];

    pub fn team(self) -> Team {
        match self {
            Slot::A1 | Slot::A2 => Team::A,
            Slot::B1 | Slot::B2 => Team::B,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Slot::A1 => "A1",
            Slot::A2 => "A2",
            Slot::B1 => "B1",
            Slot::B2 => "B2",
        };
        f.write_str(label)
    }
}

/// Outcome of a single game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    TeamA,
    TeamB,
    Draw,
    #[default]
    Unset,
}

impl GameResult {
    /// Winning side, if the game was won outright
    pub fn winner(self) -> Option<Team> {
        match self {
            GameResult::TeamA => Some(Team::A),
            GameResult::TeamB => Some(Team::B),
            GameResult::Draw | GameResult::Unset => None,
        }
    }

    pub fn is_set(self) -> bool {
        self != GameResult::Unset
    }
}

/// A player sitting in a slot, with an optional skill tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SlotEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), level: None }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Trimmed name, `None` when blank
    pub fn player_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Trimmed level, `None` when absent or blank
    pub fn player_level(&self) -> Option<&str> {
        self.level.as_deref().map(str::trim).filter(|level| !level.is_empty())
    }
}

/// One doubles match within a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    #[serde(default)]
    pub a1: Option<SlotEntry>,
    #[serde(default)]
    pub a2: Option<SlotEntry>,
    #[serde(default)]
    pub b1: Option<SlotEntry>,
    #[serde(default)]
    pub b2: Option<SlotEntry>,
    #[serde(default)]
    pub shuttles_used: u32,
    #[serde(default)]
    pub result: GameResult,
}

impl Game {
    /// Build a full doubles game from player names
    pub fn doubles(
        team_a: [&str; 2],
        team_b: [&str; 2],
        shuttles_used: u32,
        result: GameResult,
    ) -> Self {
        Self {
            a1: Some(SlotEntry::new(team_a[0])),
            a2: Some(SlotEntry::new(team_a[1])),
            b1: Some(SlotEntry::new(team_b[0])),
            b2: Some(SlotEntry::new(team_b[1])),
            shuttles_used,
            result,
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<&SlotEntry> {
        match slot {
            Slot::A1 => self.a1.as_ref(),
            Slot::A2 => self.a2.as_ref(),
            Slot::B1 => self.b1.as_ref(),
            Slot::B2 => self.b2.as_ref(),
        }
    }

    pub fn set_slot(&mut self, slot: Slot, entry: Option<SlotEntry>) {
        let target = match slot {
            Slot::A1 => &mut self.a1,
            Slot::A2 => &mut self.a2,
            Slot::B1 => &mut self.b1,
            Slot::B2 => &mut self.b2,
        };
        *target = entry;
    }

    /// Named players in slot order. A name repeated in a later slot is skipped.
    pub fn players(&self) -> Vec<(Slot, &SlotEntry)> {
        let mut players: Vec<(Slot, &SlotEntry)> = Vec::with_capacity(4);
        for slot in Slot::ALL {
            let Some(entry) = self.slot(slot) else { continue };
            let Some(name) = entry.player_name() else { continue };
            if players.iter().any(|(_, seen)| seen.player_name() == Some(name)) {
                continue;
            }
            players.push((slot, entry));
        }
        players
    }

    /// First non-empty level given to `name` in slot order, looking at every
    /// slot the name occupies
    pub fn level_of(&self, name: &str) -> Option<&str> {
        Slot::ALL
            .into_iter()
            .filter_map(|slot| self.slot(slot))
            .filter(|entry| entry.player_name() == Some(name))
            .find_map(SlotEntry::player_level)
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_set()
    }

    /// What this game adds to each of its players' tallies
    pub fn tally(&self) -> Vec<(&str, Tally)> {
        let winner = self.result.winner();
        self.players()
            .into_iter()
            .filter_map(|(slot, entry)| {
                let name = entry.player_name()?;
                let mut tally = Tally {
                    games_played: 1,
                    shuttles_used: self.shuttles_used,
                    ..Tally::default()
                };
                if winner == Some(slot.team()) {
                    tally.wins = 1;
                    tally.score = WIN_SCORE;
                } else if self.result == GameResult::Draw {
                    tally.score = DRAW_SCORE;
                }
                Some((name, tally))
            })
            .collect()
    }
}

/// Per-player counters accumulated over games
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub games_played: u32,
    pub shuttles_used: u32,
    pub wins: u32,
    pub score: u32,
}

impl Tally {
    pub fn add(&mut self, other: Tally) {
        self.games_played = self.games_played.saturating_add(other.games_played);
        self.shuttles_used = self.shuttles_used.saturating_add(other.shuttles_used);
        self.wins = self.wins.saturating_add(other.wins);
        self.score = self.score.saturating_add(other.score);
    }

    /// Remove a previously added contribution
    pub fn retract(&mut self, other: Tally) {
        self.games_played = self.games_played.saturating_sub(other.games_played);
        self.shuttles_used = self.shuttles_used.saturating_sub(other.shuttles_used);
        self.wins = self.wins.saturating_sub(other.wins);
        self.score = self.score.saturating_sub(other.score);
    }

    pub fn is_empty(&self) -> bool {
        self.games_played == 0
    }
}

/// Coupon redemption state in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponStatus {
    #[default]
    Active,
    Used,
}

/// A prepaid discount credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub discount_amount: Decimal,
    #[serde(default)]
    pub status: CouponStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_in_session: Option<String>,
}

impl Coupon {
    pub fn new(id: impl Into<String>, discount_amount: Decimal) -> Self {
        Self {
            id: id.into(),
            discount_amount,
            status: CouponStatus::Active,
            used_by: None,
            used_in_session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CouponStatus::Active
    }

    /// Mark the coupon as spent by a member in a session
    pub fn redeem(&mut self, member: impl Into<String>, session_id: impl Into<String>) {
        self.status = CouponStatus::Used;
        self.used_by = Some(member.into());
        self.used_in_session = Some(session_id.into());
    }

    /// Return the coupon to the active pool
    pub fn release(&mut self) {
        self.status = CouponStatus::Active;
        self.used_by = None;
        self.used_in_session = None;
    }
}

/// A coupon applied to one member for the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponAssignment {
    pub coupon_id: String,
    pub discount_amount: Decimal,
    pub member_name: String,
}

/// Discount that was taken off a player's total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub coupon_id: String,
    pub amount: Decimal,
}

/// Financial and playing summary for one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub name: String,
    pub level: Option<String>,
    pub games_played: u32,
    pub shuttles_used: u32,
    pub wins: u32,
    pub score: u32,
    pub shuttle_cost: Decimal,
    pub court_share: Decimal,
    pub organizer_share: Decimal,
    pub discount: Option<AppliedDiscount>,
    pub total: Decimal,
    pub is_paid: bool,
}

impl PlayerSummary {
    /// Shuttle, court and organizer cost before any discount
    pub fn raw_total(&self) -> Decimal {
        self.shuttle_cost + self.court_share + self.organizer_share
    }

    pub fn tally(&self) -> Tally {
        Tally {
            games_played: self.games_played,
            shuttles_used: self.shuttles_used,
            wins: self.wins,
            score: self.score,
        }
    }
}
