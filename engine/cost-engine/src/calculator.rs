use crate::config::{RawFeeConfig, SessionConfig};
use crate::money::{ceil_units, safe_sub};
use crate::types::{
    AppliedDiscount, CouponAssignment, Game, PaidLedger, PlayerSummary, Tally,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Per-player summaries for a session plus the rounded grand total
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    players: BTreeMap<String, PlayerSummary>,
    grand_total: Decimal,
}

impl SessionSummary {
    /// The result of a calculation that could not proceed
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn get(&self, name: &str) -> Option<&PlayerSummary> {
        self.players.get(name)
    }

    /// Summaries ordered by player name
    pub fn players(&self) -> impl Iterator<Item = &PlayerSummary> {
        self.players.values()
    }

    /// `ceil` of the sum of every player's total
    pub fn grand_total(&self) -> Decimal {
        self.grand_total
    }

    /// Sum of the totals still owed by unpaid players
    pub fn outstanding_total(&self) -> Decimal {
        self.players.values().filter(|p| !p.is_paid).map(|p| p.total).sum()
    }

    /// Set a player's paid flag, returning the previous value
    pub fn set_paid(&mut self, name: &str, paid: bool) -> Option<bool> {
        self.players.get_mut(name).map(|player| std::mem::replace(&mut player.is_paid, paid))
    }

    /// Flip a player's paid flag, returning the new value
    pub fn toggle_paid(&mut self, name: &str) -> Option<bool> {
        let player = self.players.get_mut(name)?;
        player.is_paid = !player.is_paid;
        Some(player.is_paid)
    }

    /// Paid flags for every participant, as persisted in the ledger
    pub fn paid_ledger(&self) -> PaidLedger {
        self.players.iter().map(|(name, p)| (name.clone(), p.is_paid)).collect()
    }
}

struct Accumulator<'a> {
    tally: Tally,
    level: Option<&'a str>,
}

/// Cost allocation over a fixed, validated fee configuration
#[derive(Debug, Clone)]
pub struct CostCalculator {
    config: SessionConfig,
}

impl CostCalculator {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Derive every participant's summary from the session's games.
    ///
    /// Pure and deterministic: the whole summary is rebuilt on each call.
    pub fn compute(
        &self,
        games: &[Game],
        coupons: &[CouponAssignment],
        prior_paid: &PaidLedger,
        pre_settled: &[String],
    ) -> SessionSummary {
        if games.is_empty() {
            debug!("No games in session, nothing to allocate");
            return SessionSummary::empty();
        }

        let mut accumulated: BTreeMap<&str, Accumulator<'_>> = BTreeMap::new();
        for game in games {
            for (_, entry) in game.players() {
                let Some(name) = entry.player_name() else { continue };
                let acc = accumulated
                    .entry(name)
                    .or_insert_with(|| Accumulator { tally: Tally::default(), level: None });
                if acc.level.is_none() {
                    acc.level = game.level_of(name);
                }
            }
            for (name, tally) in game.tally() {
                if let Some(acc) = accumulated.get_mut(name) {
                    acc.tally.add(tally);
                }
            }
        }

        if accumulated.is_empty() {
            debug!("Games contain no named players, nothing to allocate");
            return SessionSummary::empty();
        }

        let participant_count = accumulated.len();
        let organizer_share = self.config.organizer_share();

        let mut players: BTreeMap<String, PlayerSummary> = BTreeMap::new();
        for (name, acc) in accumulated {
            let priced = self.config.shuttle_cost(acc.tally.shuttles_used).and_then(|shuttle| {
                let court =
                    self.config.court_fee.share_for(acc.tally.games_played, participant_count)?;
                let raw_total = shuttle.checked_add(court)?.checked_add(organizer_share)?;
                Some((shuttle, court, raw_total))
            });
            let Some((shuttle_cost, court_share, raw_total)) = priced else {
                warn!(player = name, "Fee amounts overflow, returning empty summary");
                return SessionSummary::empty();
            };

            let discount = coupons
                .iter()
                .find(|assignment| assignment.member_name.trim() == name)
                .map(|assignment| AppliedDiscount {
                    coupon_id: assignment.coupon_id.clone(),
                    amount: assignment.discount_amount,
                });
            let total = match &discount {
                Some(applied) => safe_sub(raw_total, applied.amount),
                None => raw_total,
            };

            let is_paid = pre_settled.iter().any(|settled| settled.trim() == name)
                || prior_paid.get(name).copied().unwrap_or(false);

            let summary = PlayerSummary {
                name: name.to_string(),
                level: acc.level.map(str::to_string),
                games_played: acc.tally.games_played,
                shuttles_used: acc.tally.shuttles_used,
                wins: acc.tally.wins,
                score: acc.tally.score,
                shuttle_cost,
                court_share,
                organizer_share,
                discount,
                total,
                is_paid,
            };
            players.insert(name.to_string(), summary);
        }

        let Some(sum) = players
            .values()
            .try_fold(Decimal::ZERO, |sum, player| sum.checked_add(player.total))
        else {
            warn!(participants = participant_count, "Grand total overflows, returning empty");
            return SessionSummary::empty();
        };
        let grand_total = ceil_units(sum);

        debug!(
            participants = participant_count,
            games = games.len(),
            court_mode = self.config.court_fee.field(),
            %grand_total,
            "Computed session summary"
        );

        SessionSummary { players, grand_total }
    }
}

/// Compute summaries straight from the store's fee record.
///
/// Returns the empty summary when there are no games or the fee record does
/// not validate. Use [`SessionConfig::parse`] to learn which field is wrong.
pub fn compute_summaries(
    games: &[Game],
    raw: &RawFeeConfig,
    coupons: &[CouponAssignment],
    prior_paid: &PaidLedger,
    pre_settled: &[String],
) -> SessionSummary {
    if games.is_empty() {
        return SessionSummary::empty();
    }

    match SessionConfig::parse(raw) {
        Ok(config) => CostCalculator::new(config).compute(games, coupons, prior_paid, pre_settled),
        Err(err) => {
            debug!("Fee configuration not usable, returning empty summary: {}", err);
            SessionSummary::empty()
        }
    }
}
