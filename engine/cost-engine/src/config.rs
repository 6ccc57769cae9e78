//! Session fee configuration: the raw store record and its validated form

use crate::error::ConfigError;
use crate::money::{ceil_units, parse_amount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TOTAL_COURT_FEE: &str = "totalCourtFee";
pub const PER_GAME_COURT_FEE: &str = "perGameCourtFee";
pub const FIXED_PER_PERSON_COURT_FEE: &str = "fixedPerPersonCourtFee";
pub const SHUTTLE_PRICE: &str = "shuttlePrice";
pub const ORGANIZER_FEE: &str = "organizerFee";

/// Fee record exactly as the store keeps it.
///
/// Every field is loosely typed: absent, `null`, a number or a numeric
/// string. Use [`SessionConfig::parse`] before doing any arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeeConfig {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub total_court_fee: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub per_game_court_fee: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub fixed_per_person_court_fee: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub shuttle_price: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub organizer_fee: Value,
}

impl RawFeeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total_court_fee(mut self, amount: Decimal) -> Self {
        self.total_court_fee = amount_value(amount);
        self
    }

    pub fn with_per_game_court_fee(mut self, amount: Decimal) -> Self {
        self.per_game_court_fee = amount_value(amount);
        self
    }

    pub fn with_fixed_per_person_court_fee(mut self, amount: Decimal) -> Self {
        self.fixed_per_person_court_fee = amount_value(amount);
        self
    }

    pub fn with_shuttle_price(mut self, amount: Decimal) -> Self {
        self.shuttle_price = amount_value(amount);
        self
    }

    pub fn with_organizer_fee(mut self, amount: Decimal) -> Self {
        self.organizer_fee = amount_value(amount);
        self
    }

    /// Clear all three court-fee fields
    pub fn without_court_fee(mut self) -> Self {
        self.total_court_fee = Value::Null;
        self.per_game_court_fee = Value::Null;
        self.fixed_per_person_court_fee = Value::Null;
        self
    }
}

fn amount_value(amount: Decimal) -> Value {
    Value::String(amount.normalize().to_string())
}

/// How the court cost is divided among participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "amount", rename_all = "camelCase")]
pub enum CourtFee {
    /// One bill split evenly across every participant
    Total(Decimal),
    /// Rate charged per game each player played
    PerGame(Decimal),
    /// Flat amount per participant
    FixedPerPerson(Decimal),
}

impl CourtFee {
    /// Court share for one player, rounded up to a whole unit.
    ///
    /// `None` when the amount does not fit in a [`Decimal`].
    pub fn share_for(&self, games_played: u32, participant_count: usize) -> Option<Decimal> {
        match *self {
            CourtFee::FixedPerPerson(amount) => Some(ceil_units(amount)),
            CourtFee::PerGame(rate) => {
                Decimal::from(games_played).checked_mul(rate).map(ceil_units)
            }
            CourtFee::Total(total) => {
                if participant_count == 0 {
                    return Some(Decimal::ZERO);
                }
                total.checked_div(Decimal::from(participant_count as u64)).map(ceil_units)
            }
        }
    }

    /// Store field this mode is written to
    pub fn field(&self) -> &'static str {
        match self {
            CourtFee::Total(_) => TOTAL_COURT_FEE,
            CourtFee::PerGame(_) => PER_GAME_COURT_FEE,
            CourtFee::FixedPerPerson(_) => FIXED_PER_PERSON_COURT_FEE,
        }
    }
}

/// Validated fee configuration for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub court_fee: CourtFee,
    pub shuttle_price: Decimal,
    pub organizer_fee: Decimal,
}

impl SessionConfig {
    pub fn new(court_fee: CourtFee, shuttle_price: Decimal, organizer_fee: Decimal) -> Self {
        Self { court_fee, shuttle_price, organizer_fee }
    }

    /// Validate a raw store record.
    ///
    /// Exactly one court-fee field must be set; shuttle price and organizer
    /// fee are both required. All values must be non-negative numbers.
    pub fn parse(raw: &RawFeeConfig) -> Result<Self, ConfigError> {
        let total = field(TOTAL_COURT_FEE, &raw.total_court_fee)?;
        let per_game = field(PER_GAME_COURT_FEE, &raw.per_game_court_fee)?;
        let fixed = field(FIXED_PER_PERSON_COURT_FEE, &raw.fixed_per_person_court_fee)?;

        let modes: Vec<CourtFee> = [
            fixed.map(CourtFee::FixedPerPerson),
            per_game.map(CourtFee::PerGame),
            total.map(CourtFee::Total),
        ]
        .into_iter()
        .flatten()
        .collect();

        let court_fee = match modes.as_slice() {
            [] => return Err(ConfigError::MissingCourtFee),
            [mode] => *mode,
            many => {
                return Err(ConfigError::ConflictingCourtFees {
                    fields: many.iter().map(CourtFee::field).collect(),
                })
            }
        };

        let shuttle_price = field(SHUTTLE_PRICE, &raw.shuttle_price)?
            .ok_or(ConfigError::MissingField { field: SHUTTLE_PRICE })?;
        let organizer_fee = field(ORGANIZER_FEE, &raw.organizer_fee)?
            .ok_or(ConfigError::MissingField { field: ORGANIZER_FEE })?;

        Ok(Self { court_fee, shuttle_price, organizer_fee })
    }

    /// Store record for this configuration
    pub fn to_raw(&self) -> RawFeeConfig {
        let raw = RawFeeConfig::new()
            .with_shuttle_price(self.shuttle_price)
            .with_organizer_fee(self.organizer_fee);
        match self.court_fee {
            CourtFee::Total(amount) => raw.with_total_court_fee(amount),
            CourtFee::PerGame(amount) => raw.with_per_game_court_fee(amount),
            CourtFee::FixedPerPerson(amount) => raw.with_fixed_per_person_court_fee(amount),
        }
    }

    /// Shuttle cost for a number of shuttles, rounded up. `None` on overflow.
    pub fn shuttle_cost(&self, shuttles_used: u32) -> Option<Decimal> {
        Decimal::from(shuttles_used).checked_mul(self.shuttle_price).map(ceil_units)
    }

    /// Organizer fee per participant, rounded up
    pub fn organizer_share(&self) -> Decimal {
        ceil_units(self.organizer_fee)
    }
}

fn field(name: &'static str, value: &Value) -> Result<Option<Decimal>, ConfigError> {
    parse_amount(value).map_err(|value| ConfigError::InvalidField { field: name, value })
}
