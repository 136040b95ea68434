//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose check-in use-cases to Dart via FRB.
//! - Rebuild the log manager per call from persisted state (history plus
//!   the draft scratch slot), so no session lives across calls.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported as `ok=false` envelopes with a message.
//! - `status` in a snapshot describes the operation just performed; a fresh
//!   call without `save`/`load` always reports `unsaved`.

use neurolens_core::db::open_db;
use neurolens_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CyclePhase, DailyLogManager, LogSummary, ManagerConfig, SaveStatus, SqliteLogRepository,
    SqliteScratchStore, SymptomKey, SystemClock, TODAY_DRAFT_KEY,
};
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const CHECKIN_DB_FILE_NAME: &str = "neurolens_checkin.sqlite3";
const CHECKIN_DB_PATH_ENV: &str = "NEUROLENS_DB_PATH";
static CHECKIN_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

type CheckinManager<'conn> =
    DailyLogManager<SqliteLogRepository<'conn>, SqliteScratchStore<'conn>, SystemClock>;

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One symptom rating in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomRatingItem {
    /// Stable symptom key, e.g. `sensory-overload`.
    pub symptom: String,
    /// Severity in `0..=5`.
    pub value: u8,
}

/// Draft state returned by every check-in call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinSnapshot {
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
    /// Today's `YYYY-MM-DD` key.
    pub date_key: String,
    pub ratings: Vec<SymptomRatingItem>,
    /// `menstrual|follicular|ovulatory|luteal|na`.
    pub phase: String,
    pub notes: String,
    /// `unsaved|saved|failed`.
    pub status: String,
    pub active_log_id: Option<String>,
    pub log_count: u32,
}

impl CheckinSnapshot {
    fn from_manager(manager: &CheckinManager<'_>, message: impl Into<String>) -> Self {
        let draft = manager.draft();
        Self {
            ok: true,
            message: message.into(),
            date_key: draft.date_key.to_string(),
            ratings: draft
                .ratings
                .iter()
                .map(|(symptom, value)| SymptomRatingItem {
                    symptom: symptom.as_str().to_string(),
                    value,
                })
                .collect(),
            phase: draft.phase.as_str().to_string(),
            notes: draft.notes.clone(),
            status: status_label(manager.status()).to_string(),
            active_log_id: manager.active_log_id().map(|id| id.to_string()),
            log_count: u32::try_from(manager.history().len()).unwrap_or(u32::MAX),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            date_key: String::new(),
            ratings: Vec::new(),
            phase: String::new(),
            notes: String::new(),
            status: String::new(),
            active_log_id: None,
            log_count: 0,
        }
    }
}

/// History list row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinHistoryItem {
    pub log_id: String,
    pub date_key: String,
    /// Epoch milliseconds of the last save.
    pub saved_at: i64,
    /// Display label, e.g. `Luteal` or `N/A`.
    pub phase_label: String,
    pub total_stars: u32,
    pub notes_preview: Option<String>,
}

/// History response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinHistoryResponse {
    pub ok: bool,
    pub items: Vec<CheckinHistoryItem>,
    pub message: String,
}

/// Returns today's draft, restored from the scratch slot when present.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_snapshot(user_id: String) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_snapshot", |_| Ok("Draft loaded.".to_string()))
}

/// Sets one symptom rating; rejects values outside `0..=5`.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_set_rating(user_id: String, symptom: String, value: i64) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_set_rating", |manager| {
        let symptom = SymptomKey::parse(&symptom).map_err(|err| err.to_string())?;
        manager
            .set_rating(symptom, value)
            .map_err(|err| err.to_string())?;
        Ok("Rating updated.".to_string())
    })
}

/// Resets one symptom rating to zero.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_clear_rating(user_id: String, symptom: String) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_clear_rating", |manager| {
        let symptom = SymptomKey::parse(&symptom).map_err(|err| err.to_string())?;
        manager.clear_rating(symptom);
        Ok("Rating cleared.".to_string())
    })
}

/// Sets the cycle phase; accepts `na` or `not-applicable`.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_set_phase(user_id: String, phase: String) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_set_phase", |manager| {
        let phase = CyclePhase::parse(&phase).map_err(|err| err.to_string())?;
        manager.set_phase(phase);
        Ok("Phase updated.".to_string())
    })
}

/// Replaces draft notes.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_set_notes(user_id: String, notes: String) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_set_notes", |manager| {
        manager.set_notes(notes);
        Ok("Notes updated.".to_string())
    })
}

/// Saves today's log.
///
/// # FFI contract
/// - A storage failure still returns `ok=true` with `status=failed`; the UI
///   should offer a retry instead of reporting success.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_save(user_id: String) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_save", |manager| {
        let receipt = manager.save();
        Ok(match receipt.status {
            SaveStatus::Saved if receipt.created => "Saved to Previous Logs.".to_string(),
            SaveStatus::Saved => "Saved. You can adjust anytime.".to_string(),
            _ => "Save failed. Try again.".to_string(),
        })
    })
}

/// Copies a past log into today's draft.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_load(user_id: String, log_id: String) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_load", |manager| {
        let log_id = Uuid::parse_str(log_id.trim())
            .map_err(|_| format!("invalid log id `{}`", log_id.trim()))?;
        manager.load(log_id).map_err(|err| err.to_string())?;
        Ok("Editing entry from existing log.".to_string())
    })
}

/// Discards draft values and starts a blank check-in.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_start_new(user_id: String) -> CheckinSnapshot {
    with_manager(&user_id, "checkin_start_new", |manager| {
        manager.start_new_log();
        Ok("Started a new log.".to_string())
    })
}

/// Lists committed logs, recently saved first.
#[flutter_rust_bridge::frb(sync)]
pub fn checkin_history(user_id: String) -> CheckinHistoryResponse {
    let db_path = resolve_checkin_db_path();
    let conn = match open_db(&db_path) {
        Ok(conn) => conn,
        Err(err) => return history_failure(format!("checkin_history failed: {err}")),
    };
    let manager = match open_manager(&conn, &user_id) {
        Ok(manager) => manager,
        Err(err) => return history_failure(format!("checkin_history failed: {err}")),
    };

    let items = manager
        .history_summaries()
        .into_iter()
        .map(to_history_item)
        .collect::<Vec<_>>();
    let message = if items.is_empty() {
        "No saved logs yet.".to_string()
    } else {
        format!("Found {} log(s).", items.len())
    };
    CheckinHistoryResponse {
        ok: true,
        items,
        message,
    }
}

fn with_manager(
    user_id: &str,
    operation: &'static str,
    f: impl FnOnce(&mut CheckinManager<'_>) -> Result<String, String>,
) -> CheckinSnapshot {
    let db_path = resolve_checkin_db_path();
    let conn = match open_db(&db_path) {
        Ok(conn) => conn,
        Err(err) => return CheckinSnapshot::failure(format!("{operation} failed: {err}")),
    };
    let mut manager = match open_manager(&conn, user_id) {
        Ok(manager) => manager,
        Err(err) => return CheckinSnapshot::failure(format!("{operation} failed: {err}")),
    };

    match f(&mut manager) {
        Ok(message) => CheckinSnapshot::from_manager(&manager, message),
        Err(err) => {
            let mut snapshot =
                CheckinSnapshot::from_manager(&manager, format!("{operation} failed: {err}"));
            snapshot.ok = false;
            snapshot
        }
    }
}

fn open_manager<'conn>(
    conn: &'conn rusqlite::Connection,
    user_id: &str,
) -> Result<CheckinManager<'conn>, String> {
    let repo = SqliteLogRepository::try_new(conn).map_err(|err| err.to_string())?;
    let scratch = SqliteScratchStore::try_new(conn).map_err(|err| err.to_string())?;
    // One device database may hold several accounts; scope the draft slot.
    let config = ManagerConfig {
        scratch_key: format!("{TODAY_DRAFT_KEY}:{}", user_id.trim()),
        ..ManagerConfig::default()
    };
    DailyLogManager::open(user_id, repo, scratch, SystemClock, config).map_err(|err| err.to_string())
}

fn resolve_checkin_db_path() -> PathBuf {
    CHECKIN_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(CHECKIN_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(CHECKIN_DB_FILE_NAME)
        })
        .clone()
}

fn history_failure(message: String) -> CheckinHistoryResponse {
    log::warn!("event=checkin_history module=ffi status=error");
    CheckinHistoryResponse {
        ok: false,
        items: Vec::new(),
        message,
    }
}

fn to_history_item(summary: LogSummary) -> CheckinHistoryItem {
    CheckinHistoryItem {
        log_id: summary.id.to_string(),
        date_key: summary.date_key.to_string(),
        saved_at: summary.saved_at,
        phase_label: summary.phase.label().to_string(),
        total_stars: summary.total_stars,
        notes_preview: summary.notes_preview,
    }
}

fn status_label(status: SaveStatus) -> &'static str {
    match status {
        SaveStatus::Unsaved => "unsaved",
        SaveStatus::Saved => "saved",
        SaveStatus::Failed => "failed",
    }
}
