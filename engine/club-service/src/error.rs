//! Error types for the club service

use cost_engine::{ConfigError, CouponError, SessionError};
use persistence::PersistenceError;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by the workflow, reports and command line
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Token did not resolve to an account
    #[error("Unauthenticated: token is not recognised")]
    Unauthenticated,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Player {0:?} is not part of this session")]
    PlayerNotFound(String),

    /// Finalizing needs at least one computed player summary
    #[error("Session {0} has nothing to finalize")]
    NothingToFinalize(String),

    #[error("Session {0} has no date and cannot be filed under a month")]
    MissingSessionDate(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    /// Fee configuration errors, carrying the offending field
    #[error("Fee configuration error: {0}")]
    FeeConfig(#[from] ConfigError),

    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),

    #[error("Live session error: {0}")]
    Session(#[from] SessionError),

    #[error("Store error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Service configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Lookup failures the user can fix by naming something else
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            ServiceError::Unauthenticated
                | ServiceError::SessionNotFound(_)
                | ServiceError::CouponNotFound(_)
                | ServiceError::PlayerNotFound(_)
        )
    }
}
