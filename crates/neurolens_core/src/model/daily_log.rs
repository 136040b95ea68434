//! Daily check-in log domain model.
//!
//! # Responsibility
//! - Define the committed daily log record and its value types.
//! - Own rating bounds and calendar date-key formatting rules.
//!
//! # Invariants
//! - `id` is stable once created and never reused for another log.
//! - At most one log exists per `(user, date_key)`; enforced by storage and
//!   the log manager upsert rule.
//! - Every rating is an integer within `0..=MAX_RATING`.
//! - `ratings` always carries every `SymptomKey`.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static DATE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date key regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Highest severity a symptom can be rated.
pub const MAX_RATING: u8 = 5;
/// Character budget for `LogSummary::notes_preview`.
pub const NOTES_PREVIEW_CHARS: usize = 70;

/// Stable identifier of one committed daily log.
pub type LogId = Uuid;

/// Validation failures for daily log input and persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogValidationError {
    RatingOutOfRange { symptom: SymptomKey, value: i64 },
    InvalidDateKey(String),
    UnknownPhase(String),
    UnknownSymptom(String),
}

impl Display for LogValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RatingOutOfRange { symptom, value } => write!(
                f,
                "rating {value} for `{}` is outside 0..={MAX_RATING}",
                symptom.as_str()
            ),
            Self::InvalidDateKey(value) => {
                write!(f, "invalid date key `{value}`; expected YYYY-MM-DD")
            }
            Self::UnknownPhase(value) => write!(f, "unknown cycle phase `{value}`"),
            Self::UnknownSymptom(value) => write!(f, "unknown symptom key `{value}`"),
        }
    }
}

impl Error for LogValidationError {}

/// Calendar day in the user's local timezone, formatted `YYYY-MM-DD`.
///
/// Natural key for the "one log per day" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parses a strict zero-padded `YYYY-MM-DD` key.
    pub fn parse(value: &str) -> Result<Self, LogValidationError> {
        let trimmed = value.trim();
        if !DATE_KEY_RE.is_match(trimmed) {
            return Err(LogValidationError::InvalidDateKey(value.to_string()));
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| LogValidationError::InvalidDateKey(value.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl TryFrom<String> for DateKey {
    type Error = LogValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<DateKey> for String {
    fn from(value: DateKey) -> Self {
        value.to_string()
    }
}

/// Fixed symptom set rated on every check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymptomKey {
    /// Task initiation, prioritizing, switching.
    ExecutiveDysfunction,
    /// Noise, lights, textures, crowded spaces.
    SensoryOverload,
    /// Performing "fine" while feeling depleted.
    HighMasking,
    /// Post-social fatigue, shutdown, avoidance.
    SocialBurnout,
    /// Deep immersion; time blindness.
    Hyperfocus,
}

impl SymptomKey {
    pub const ALL: [SymptomKey; 5] = [
        SymptomKey::ExecutiveDysfunction,
        SymptomKey::SensoryOverload,
        SymptomKey::HighMasking,
        SymptomKey::SocialBurnout,
        SymptomKey::Hyperfocus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExecutiveDysfunction => "executive-dysfunction",
            Self::SensoryOverload => "sensory-overload",
            Self::HighMasking => "high-masking",
            Self::SocialBurnout => "social-burnout",
            Self::Hyperfocus => "hyperfocus",
        }
    }

    pub fn parse(value: &str) -> Result<Self, LogValidationError> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| LogValidationError::UnknownSymptom(value.to_string()))
    }
}

/// Menstrual-cycle phase tag attached to a log for later correlation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
    /// Serialized as `na` to match stored documents.
    #[default]
    #[serde(rename = "na")]
    NotApplicable,
}

impl CyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Menstrual => "menstrual",
            Self::Follicular => "follicular",
            Self::Ovulatory => "ovulatory",
            Self::Luteal => "luteal",
            Self::NotApplicable => "na",
        }
    }

    /// Human-readable label for list views.
    pub fn label(self) -> &'static str {
        match self {
            Self::Menstrual => "Menstrual",
            Self::Follicular => "Follicular",
            Self::Ovulatory => "Ovulatory",
            Self::Luteal => "Luteal",
            Self::NotApplicable => "N/A",
        }
    }

    /// Accepts `not-applicable` as an alias of `na`.
    pub fn parse(value: &str) -> Result<Self, LogValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "menstrual" => Ok(Self::Menstrual),
            "follicular" => Ok(Self::Follicular),
            "ovulatory" => Ok(Self::Ovulatory),
            "luteal" => Ok(Self::Luteal),
            "na" | "not-applicable" | "not_applicable" => Ok(Self::NotApplicable),
            _ => Err(LogValidationError::UnknownPhase(value.to_string())),
        }
    }
}

/// Per-symptom severity map.
///
/// Missing keys read back as `0`, so older or partial documents still load
/// with the full symptom set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<SymptomKey, u8>", into = "BTreeMap<SymptomKey, u8>")]
pub struct SymptomRatings(BTreeMap<SymptomKey, u8>);

impl Default for SymptomRatings {
    fn default() -> Self {
        Self(SymptomKey::ALL.into_iter().map(|key| (key, 0)).collect())
    }
}

impl From<BTreeMap<SymptomKey, u8>> for SymptomRatings {
    fn from(mut value: BTreeMap<SymptomKey, u8>) -> Self {
        for key in SymptomKey::ALL {
            value.entry(key).or_insert(0);
        }
        Self(value)
    }
}

impl From<SymptomRatings> for BTreeMap<SymptomKey, u8> {
    fn from(value: SymptomRatings) -> Self {
        value.0
    }
}

impl SymptomRatings {
    pub fn get(&self, symptom: SymptomKey) -> u8 {
        self.0.get(&symptom).copied().unwrap_or(0)
    }

    /// Sets one rating after bound checks; the map is untouched on error.
    pub fn set(&mut self, symptom: SymptomKey, value: i64) -> Result<(), LogValidationError> {
        let rating = checked_rating(symptom, value)?;
        self.0.insert(symptom, rating);
        Ok(())
    }

    /// Resets one rating to zero.
    pub fn clear(&mut self, symptom: SymptomKey) {
        self.0.insert(symptom, 0);
    }

    /// Sum of all ratings ("total stars").
    pub fn total(&self) -> u32 {
        self.0.values().map(|value| u32::from(*value)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymptomKey, u8)> + '_ {
        self.0.iter().map(|(key, value)| (*key, *value))
    }

    pub fn validate(&self) -> Result<(), LogValidationError> {
        for (symptom, value) in self.iter() {
            checked_rating(symptom, i64::from(value))?;
        }
        Ok(())
    }
}

fn checked_rating(symptom: SymptomKey, value: i64) -> Result<u8, LogValidationError> {
    if (0..=i64::from(MAX_RATING)).contains(&value) {
        // Bounded above, cannot truncate.
        Ok(value as u8)
    } else {
        Err(LogValidationError::RatingOutOfRange { symptom, value })
    }
}

/// Committed check-in for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub id: LogId,
    pub date_key: DateKey,
    /// Unix epoch milliseconds of the last write.
    pub saved_at: i64,
    pub phase: CyclePhase,
    pub ratings: SymptomRatings,
    pub notes: String,
}

impl DailyLog {
    /// Creates an empty log with a generated stable ID.
    pub fn new(date_key: DateKey, saved_at: i64) -> Self {
        Self::with_id(Uuid::new_v4(), date_key, saved_at)
    }

    /// Creates an empty log with a caller-provided ID.
    ///
    /// Used by storage read paths where identity already exists.
    pub fn with_id(id: LogId, date_key: DateKey, saved_at: i64) -> Self {
        Self {
            id,
            date_key,
            saved_at,
            phase: CyclePhase::default(),
            ratings: SymptomRatings::default(),
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), LogValidationError> {
        self.ratings.validate()
    }

    /// Builds the compact history row for this log.
    pub fn summary(&self) -> LogSummary {
        LogSummary {
            id: self.id,
            date_key: self.date_key,
            saved_at: self.saved_at,
            phase: self.phase,
            total_stars: self.ratings.total(),
            notes_preview: notes_preview(self.notes.as_str()),
        }
    }
}

/// History list row derived from a `DailyLog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSummary {
    pub id: LogId,
    pub date_key: DateKey,
    pub saved_at: i64,
    pub phase: CyclePhase,
    pub total_stars: u32,
    /// `None` when notes are blank.
    pub notes_preview: Option<String>,
}

/// Collapses whitespace and truncates notes to `NOTES_PREVIEW_CHARS`.
pub fn notes_preview(notes: &str) -> Option<String> {
    let normalized = WHITESPACE_RE.replace_all(notes.trim(), " ");
    if normalized.is_empty() {
        return None;
    }
    if normalized.chars().count() <= NOTES_PREVIEW_CHARS {
        return Some(normalized.into_owned());
    }
    let mut preview = normalized
        .chars()
        .take(NOTES_PREVIEW_CHARS)
        .collect::<String>();
    preview.push('…');
    Some(preview)
}
