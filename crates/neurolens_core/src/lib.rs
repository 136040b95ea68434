//! Core domain logic for NeuroLens daily check-ins.
//! This crate is the single source of truth for check-in invariants.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::daily_log::{
    notes_preview, CyclePhase, DailyLog, DateKey, LogId, LogSummary, LogValidationError,
    SymptomKey, SymptomRatings, MAX_RATING,
};
pub use model::draft::LogDraft;
pub use repo::log_repo::{LogRepository, SqliteLogRepository};
pub use repo::scratch_store::{ScratchStore, SqliteScratchStore};
pub use repo::{RepoError, RepoResult};
pub use service::daily_log_service::{
    DailyLogManager, LogServiceError, ManagerConfig, SaveReceipt, SaveStatus,
    DEFAULT_MAX_RETAINED_LOGS, TODAY_DRAFT_KEY,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
