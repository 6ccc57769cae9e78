//! # Cost Engine
//!
//! Pure domain logic for a badminton club session: the games played, the fee
//! configuration, the per-player cost allocation, the coupon book, the live
//! match state machine and the monthly ranking aggregate.
//!
//! Nothing in this crate performs I/O. Callers fetch documents, hand them to
//! [`CostCalculator`] (or [`compute_summaries`] for the raw store shape), and
//! persist whatever they need from the resulting [`SessionSummary`].
//!
//! ```rust
//! use cost_engine::{compute_summaries, Game, GameResult, RawFeeConfig};
//! use rust_decimal::Decimal;
//!
//! let game = Game::doubles(["P1", "P2"], ["P3", "P4"], 3, GameResult::TeamA);
//! let raw = RawFeeConfig::new()
//!     .with_total_court_fee(Decimal::from(100))
//!     .with_shuttle_price(Decimal::from(5))
//!     .with_organizer_fee(Decimal::from(20));
//!
//! let summary = compute_summaries(&[game], &raw, &[], &Default::default(), &[]);
//! assert_eq!(summary.grand_total(), Decimal::from(240));
//! ```

pub mod calculator;
pub mod config;
pub mod coupons;
pub mod error;
pub mod live;
pub mod money;
pub mod ranking;
pub mod types;

#[cfg(test)]
mod tests;

pub use calculator::{compute_summaries, CostCalculator, SessionSummary};
pub use config::{CourtFee, RawFeeConfig, SessionConfig};
pub use coupons::CouponBook;
pub use error::{ConfigError, CouponError, SessionError};
pub use live::{GameState, LiveSession, RunningTotals, SessionStatus};
pub use ranking::{MonthKey, MonthlyRanking, RankingEntry};
pub use types::{
    AppliedDiscount, Coupon, CouponAssignment, CouponStatus, Game, GameResult, PaidLedger,
    PlayerSummary, Slot, SlotEntry, Tally, Team,
};

/// Re-export so callers do not need a direct dependency for amounts
pub use rust_decimal::Decimal;

/// Score awarded to each member of the winning team
pub const WIN_SCORE: u32 = 2;

/// Score awarded to every player of a drawn game
pub const DRAW_SCORE: u32 = 1;
