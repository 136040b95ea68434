//! In-progress check-in draft.
//!
//! # Responsibility
//! - Mirror the unsaved rating/phase/notes values for the current day.
//! - Define the JSON shape stored in the scratch slot.
//!
//! # Invariants
//! - A draft is only restored when its `date_key` equals today's key.

use crate::model::daily_log::{CyclePhase, DailyLog, DateKey, LogValidationError, SymptomRatings};
use serde::{Deserialize, Serialize};

/// Unsaved values for today's check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDraft {
    pub date_key: DateKey,
    #[serde(default)]
    pub ratings: SymptomRatings,
    #[serde(default)]
    pub phase: CyclePhase,
    #[serde(default)]
    pub notes: String,
}

impl LogDraft {
    /// Creates a blank draft for the given day.
    pub fn empty(date_key: DateKey) -> Self {
        Self {
            date_key,
            ratings: SymptomRatings::default(),
            phase: CyclePhase::default(),
            notes: String::new(),
        }
    }

    /// Copies editable fields from a committed log, keeping this draft's day.
    pub fn copy_fields_from(&mut self, log: &DailyLog) {
        self.ratings = log.ratings.clone();
        self.phase = log.phase;
        self.notes = log.notes.clone();
    }

    /// Writes editable fields onto a committed log.
    pub fn apply_to(&self, log: &mut DailyLog) {
        log.ratings = self.ratings.clone();
        log.phase = self.phase;
        log.notes = self.notes.clone();
    }

    pub fn validate(&self) -> Result<(), LogValidationError> {
        self.ratings.validate()
    }
}
