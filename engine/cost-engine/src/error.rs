//! Error types for the cost engine

use thiserror::Error;

/// Reasons a stored fee configuration cannot be used for a calculation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid value for {field}: {value:?} (expected a non-negative number)")]
    InvalidField { field: &'static str, value: String },

    #[error(
        "No court fee configured (set one of totalCourtFee, perGameCourtFee, fixedPerPersonCourtFee)"
    )]
    MissingCourtFee,

    #[error("Court fee modes are mutually exclusive, found: {}", fields.join(", "))]
    ConflictingCourtFees { fields: Vec<&'static str> },
}

impl ConfigError {
    /// Store field name the user has to fix, when there is exactly one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            Self::MissingCourtFee | Self::ConflictingCourtFees { .. } => None,
        }
    }
}

/// Coupon assignment rejections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    #[error("Member name must not be empty")]
    EmptyMemberName,

    #[error("Coupon {coupon_id} is not active")]
    CouponNotActive { coupon_id: String },

    #[error("Member {member} already holds coupon {coupon_id} in this session")]
    MemberAlreadyHasCoupon { member: String, coupon_id: String },

    #[error("Coupon {coupon_id} is already assigned to {member}")]
    CouponAlreadyAssigned { coupon_id: String, member: String },

    #[error("No coupon assignment at index {index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Live session state machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session is already open")]
    AlreadyOpen,

    #[error("Session is not open")]
    NotOpen,

    #[error("Session is already closed")]
    AlreadyClosed,

    #[error("Game {index} does not exist (have {len})")]
    GameNotFound { index: usize, len: usize },

    #[error("Session has no games")]
    NoGames,

    #[error("{count} game(s) have no result yet, first is game {first_index}")]
    UnsetGames { count: usize, first_index: usize },

    #[error("Fee configuration incomplete: {0}")]
    Config(#[from] ConfigError),
}
