//! Club Ledger Service Library
//!
//! Workflow layer on top of the cost engine and the document store:
//! account resolution, the per-session workflow with rollback on failed
//! writes, live session drafts, history reports, configuration and logging.

pub mod auth;
pub mod config;
pub mod draft;
pub mod error;
pub mod logging;
pub mod reports;
pub mod workflow;


pub use auth::{AuthProvider, StaticAuthProvider};
pub use config::{load_config, ServiceConfig};
pub use draft::SessionDraft;
pub use error::{Result, ServiceError};
pub use logging::initialize_logging;
pub use reports::{
    monthly_income, player_history, rebuild_rankings, MonthlyIncome, PlayerHistoryRow,
};
pub use workflow::{
    import_session, FinalizeOutcome, RecomputeTrigger, SessionImport, SessionWorkflow,
};
