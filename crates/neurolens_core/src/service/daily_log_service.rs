//! Daily check-in log manager.
//!
//! # Responsibility
//! - Own today's editable draft and the user's committed log history.
//! - Apply the one-log-per-day upsert rule on `save`.
//! - Mirror every draft change to a scratch slot so a reload restores it.
//!
//! # Invariants
//! - At most one log per `date_key` exists in `history()`.
//! - A log's id never changes once created.
//! - `save` always targets today's `date_key`, including right after `load`
//!   of an older log.
//! - Storage failures never roll back in-memory state; remote write failures
//!   surface as `SaveStatus::Failed`, scratch failures are only logged.
//! - A save that fails to commit never deletes stored logs; evictions wait
//!   for the next committed save.
//! - History never exceeds `ManagerConfig::max_retained_logs`.

use crate::clock::Clock;
use crate::model::daily_log::{
    CyclePhase, DailyLog, DateKey, LogId, LogSummary, LogValidationError, SymptomKey, MAX_RATING,
};
use crate::model::draft::LogDraft;
use crate::repo::log_repo::LogRepository;
use crate::repo::RepoError;
use crate::repo::scratch_store::ScratchStore;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Scratch slot key holding today's serialized draft.
pub const TODAY_DRAFT_KEY: &str = "neurolens.todayDraft";
/// Default number of committed logs retained per user.
pub const DEFAULT_MAX_RETAINED_LOGS: usize = 365;

/// Tunables for one log manager instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound on retained logs; values below 1 behave as 1.
    pub max_retained_logs: usize,
    pub scratch_key: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_retained_logs: DEFAULT_MAX_RETAINED_LOGS,
            scratch_key: TODAY_DRAFT_KEY.to_string(),
        }
    }
}

/// Persistence state of the current draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// Draft has edits not yet committed.
    Unsaved,
    /// Draft matches a committed log.
    Saved,
    /// Last save updated local history but the repository write failed.
    /// Calling `save` again retries.
    Failed,
}

/// Outcome of one `save` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub log_id: LogId,
    pub date_key: DateKey,
    /// `true` when this save created today's log.
    pub created: bool,
    pub status: SaveStatus,
    /// Logs dropped from history by the retention cap during this call.
    /// Storage rows are removed once a save commits.
    pub evicted: Vec<LogId>,
}

/// Errors for check-in use-cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogServiceError {
    InvalidUserId(String),
    RatingOutOfRange { symptom: SymptomKey, value: i64 },
    Validation(LogValidationError),
    LogNotFound(LogId),
}

impl Display for LogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUserId(value) => write!(f, "invalid user id: `{value}`"),
            Self::RatingOutOfRange { symptom, value } => write!(
                f,
                "rating {value} for `{}` must be an integer between 0 and {MAX_RATING}",
                symptom.as_str()
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::LogNotFound(id) => write!(f, "daily log not found: {id}"),
        }
    }
}

impl Error for LogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LogValidationError> for LogServiceError {
    fn from(value: LogValidationError) -> Self {
        match value {
            LogValidationError::RatingOutOfRange { symptom, value } => {
                Self::RatingOutOfRange { symptom, value }
            }
            other => Self::Validation(other),
        }
    }
}

/// Application state for one signed-in user's check-ins.
pub struct DailyLogManager<R: LogRepository, S: ScratchStore, C: Clock> {
    user_id: String,
    repo: R,
    scratch: S,
    clock: C,
    config: ManagerConfig,
    logs: Vec<DailyLog>,
    draft: LogDraft,
    status: SaveStatus,
    active_log_id: Option<LogId>,
    /// Set when history may disagree with storage; `save` re-reads first.
    history_stale: bool,
    pending_evictions: Vec<LogId>,
}

impl<R: LogRepository, S: ScratchStore, C: Clock> DailyLogManager<R, S, C> {
    /// Loads history and restores today's draft.
    ///
    /// A failed history read starts with an empty history; a missing, stale
    /// or malformed draft starts from defaults. Neither is an error.
    ///
    /// # Errors
    /// - `InvalidUserId` when `user_id` is blank.
    pub fn open(
        user_id: &str,
        repo: R,
        scratch: S,
        clock: C,
        config: ManagerConfig,
    ) -> Result<Self, LogServiceError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(LogServiceError::InvalidUserId(user_id.to_string()));
        }

        let today = clock.today();
        let (logs, history_stale) = match repo.get_logs(user_id) {
            Ok(logs) => (logs, false),
            Err(err) => {
                warn!("event=checkin_open module=checkin status=degraded error_code=history_load_failed error={err}");
                (Vec::new(), true)
            }
        };
        let restored = restore_draft(&scratch, config.scratch_key.as_str(), today);
        let draft_restored = restored.is_some();

        info!(
            "event=checkin_open module=checkin status=ok log_count={} draft_restored={draft_restored}",
            logs.len()
        );

        Ok(Self {
            user_id: user_id.to_string(),
            repo,
            scratch,
            clock,
            config,
            logs,
            draft: restored.unwrap_or_else(|| LogDraft::empty(today)),
            status: SaveStatus::Unsaved,
            active_log_id: None,
            history_stale,
            pending_evictions: Vec::new(),
        })
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_str()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn today(&self) -> DateKey {
        self.clock.today()
    }

    pub fn draft(&self) -> &LogDraft {
        &self.draft
    }

    /// Committed logs; recently saved first.
    pub fn history(&self) -> &[DailyLog] {
        &self.logs
    }

    pub fn history_summaries(&self) -> Vec<LogSummary> {
        self.logs.iter().map(DailyLog::summary).collect()
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn is_dirty(&self) -> bool {
        self.status != SaveStatus::Saved
    }

    /// Id of the log last loaded or saved, cleared by any edit.
    pub fn active_log_id(&self) -> Option<LogId> {
        self.active_log_id
    }

    /// Sets one symptom rating.
    ///
    /// # Errors
    /// - `RatingOutOfRange` when `value` is outside `0..=5`; the draft is
    ///   left unchanged.
    pub fn set_rating(&mut self, symptom: SymptomKey, value: i64) -> Result<(), LogServiceError> {
        self.draft.ratings.set(symptom, value)?;
        self.mark_edited();
        Ok(())
    }

    pub fn clear_rating(&mut self, symptom: SymptomKey) {
        self.draft.ratings.clear(symptom);
        self.mark_edited();
    }

    pub fn set_phase(&mut self, phase: CyclePhase) {
        self.draft.phase = phase;
        self.mark_edited();
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.draft.notes = notes.into();
        self.mark_edited();
    }

    /// Discards draft values and starts a blank check-in for today.
    pub fn start_new_log(&mut self) {
        self.draft = LogDraft::empty(self.clock.today());
        self.active_log_id = None;
        self.status = SaveStatus::Unsaved;
        self.persist_draft();
    }

    /// Copies a committed log into the draft for viewing or editing.
    ///
    /// The draft keeps today's date; a following `save` writes today's log,
    /// not the loaded one.
    ///
    /// # Errors
    /// - `LogNotFound` when `log_id` is not in history.
    pub fn load(&mut self, log_id: LogId) -> Result<(), LogServiceError> {
        let log = self
            .logs
            .iter()
            .find(|log| log.id == log_id)
            .ok_or(LogServiceError::LogNotFound(log_id))?;

        self.draft.copy_fields_from(log);
        self.active_log_id = Some(log_id);
        self.status = SaveStatus::Saved;
        debug!(
            "event=checkin_load module=checkin status=ok log_id={log_id} log_date={} today={}",
            log.date_key,
            self.clock.today()
        );
        self.persist_draft();
        Ok(())
    }

    /// Upserts today's log from the draft.
    ///
    /// # Side effects
    /// - Re-reads history first when the last read or write failed, so an
    ///   existing stored log for today keeps its id.
    /// - Updates history in memory before any storage call.
    /// - Writes the log through the repository; a failure is logged and
    ///   reported as `SaveStatus::Failed`.
    /// - After a committed write, deletes logs evicted by the retention cap,
    ///   best-effort.
    pub fn save(&mut self) -> SaveReceipt {
        let today = self.clock.today();
        let now = self.clock.now_epoch_ms();
        self.draft.date_key = today;
        if self.history_stale {
            self.refresh_history();
        }

        let (log, created) = match self.logs.iter_mut().find(|log| log.date_key == today) {
            Some(existing) => {
                self.draft.apply_to(existing);
                existing.saved_at = now;
                (existing.clone(), false)
            }
            None => {
                let mut fresh = DailyLog::new(today, now);
                self.draft.apply_to(&mut fresh);
                self.logs.insert(0, fresh.clone());
                (fresh, true)
            }
        };
        let evicted = self.enforce_retention(log.id);
        self.active_log_id = Some(log.id);

        self.status = match self.repo.put_log(self.user_id.as_str(), &log) {
            Ok(()) => {
                info!(
                    "event=checkin_save module=checkin status=ok log_id={} date_key={today} created={created}",
                    log.id
                );
                SaveStatus::Saved
            }
            Err(err) => {
                warn!(
                    "event=checkin_save module=checkin status=error log_id={} date_key={today} error_code=put_log_failed error={err}",
                    log.id
                );
                self.history_stale = true;
                SaveStatus::Failed
            }
        };

        self.pending_evictions.extend(evicted.iter().copied());
        if self.status == SaveStatus::Saved {
            self.flush_evictions();
        }

        SaveReceipt {
            log_id: log.id,
            date_key: today,
            created,
            status: self.status,
            evicted,
        }
    }

    fn mark_edited(&mut self) {
        self.status = SaveStatus::Unsaved;
        self.active_log_id = None;
        self.persist_draft();
    }

    /// Replaces history with stored logs, keeping local-only days.
    fn refresh_history(&mut self) {
        let mut merged = match self.repo.get_logs(self.user_id.as_str()) {
            Ok(stored) => stored,
            Err(err) => {
                warn!("event=checkin_refresh module=checkin status=error error_code=history_load_failed error={err}");
                return;
            }
        };
        merged.retain(|log| !self.pending_evictions.contains(&log.id));
        for local in self.logs.drain(..) {
            if !merged.iter().any(|stored| stored.date_key == local.date_key) {
                merged.push(local);
            }
        }
        merged.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then(a.id.cmp(&b.id)));

        debug!(
            "event=checkin_refresh module=checkin status=ok log_count={}",
            merged.len()
        );
        self.logs = merged;
        self.history_stale = false;
    }

    fn flush_evictions(&mut self) {
        let pending = std::mem::take(&mut self.pending_evictions);
        for evicted_id in pending {
            match self.repo.delete_log(self.user_id.as_str(), evicted_id) {
                Ok(()) | Err(RepoError::NotFound(_)) => {}
                Err(err) => {
                    warn!("event=checkin_evict module=checkin status=error log_id={evicted_id} error={err}");
                    self.pending_evictions.push(evicted_id);
                }
            }
        }
    }

    fn enforce_retention(&mut self, keep: LogId) -> Vec<LogId> {
        let cap = self.config.max_retained_logs.max(1);
        let mut evicted = Vec::new();
        while self.logs.len() > cap {
            let oldest = self
                .logs
                .iter()
                .enumerate()
                .filter(|(_, log)| log.id != keep)
                .min_by_key(|(_, log)| (log.date_key, log.saved_at))
                .map(|(index, _)| index);
            match oldest {
                Some(index) => evicted.push(self.logs.remove(index).id),
                None => break,
            }
        }
        if !evicted.is_empty() {
            info!(
                "event=checkin_evict module=checkin status=ok evicted_count={} cap={cap}",
                evicted.len()
            );
        }
        evicted
    }

    fn persist_draft(&mut self) {
        self.draft.date_key = self.clock.today();
        let encoded = match serde_json::to_string(&self.draft) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("event=draft_persist module=checkin status=error error_code=encode_failed error={err}");
                return;
            }
        };
        if let Err(err) = self
            .scratch
            .write_slot(self.config.scratch_key.as_str(), encoded.as_str())
        {
            warn!("event=draft_persist module=checkin status=error error_code=write_failed error={err}");
        }
    }
}

fn restore_draft(scratch: &impl ScratchStore, key: &str, today: DateKey) -> Option<LogDraft> {
    let raw = match scratch.read_slot(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!("event=draft_restore module=checkin status=error error_code=read_failed error={err}");
            return None;
        }
    };

    let draft = match serde_json::from_str::<LogDraft>(raw.as_str()) {
        Ok(draft) => draft,
        Err(err) => {
            warn!("event=draft_restore module=checkin status=skipped reason=parse_failed error={err}");
            return None;
        }
    };
    if draft.date_key != today {
        debug!(
            "event=draft_restore module=checkin status=skipped reason=stale draft_date={} today={today}",
            draft.date_key
        );
        return None;
    }
    if let Err(err) = draft.validate() {
        warn!("event=draft_restore module=checkin status=skipped reason=invalid error={err}");
        return None;
    }
    Some(draft)
}
