//! Daily log repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the `get_logs` / `put_log` contract the log manager relies on.
//! - Keep the per-user document shape (`ratings_json`) inside storage.
//!
//! # Invariants
//! - `put_log` is an upsert keyed by log `id`; one statement, last write wins.
//! - `(user_id, date_key)` is unique at the storage level.
//! - Listing order is `saved_at DESC, id ASC`.

use crate::model::daily_log::{CyclePhase, DailyLog, DateKey, LogId, SymptomRatings};
use crate::repo::{ensure_table, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const LOG_SELECT_SQL: &str = "SELECT
    id,
    date_key,
    saved_at,
    phase,
    ratings_json,
    notes
FROM daily_logs";

/// Storage contract for a user's committed daily logs.
pub trait LogRepository {
    /// Returns all logs for one user, newest `saved_at` first.
    fn get_logs(&self, user_id: &str) -> RepoResult<Vec<DailyLog>>;
    /// Inserts or replaces one log by id.
    fn put_log(&self, user_id: &str, log: &DailyLog) -> RepoResult<()>;
    /// Removes one log; used by retention eviction.
    fn delete_log(&self, user_id: &str, id: LogId) -> RepoResult<()>;
}

impl<R: LogRepository + ?Sized> LogRepository for &R {
    fn get_logs(&self, user_id: &str) -> RepoResult<Vec<DailyLog>> {
        (**self).get_logs(user_id)
    }

    fn put_log(&self, user_id: &str, log: &DailyLog) -> RepoResult<()> {
        (**self).put_log(user_id, log)
    }

    fn delete_log(&self, user_id: &str, id: LogId) -> RepoResult<()> {
        (**self).delete_log(user_id, id)
    }
}

/// SQLite-backed daily log repository.
pub struct SqliteLogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLogRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table(conn, "daily_logs")?;
        Ok(Self { conn })
    }
}

impl LogRepository for SqliteLogRepository<'_> {
    fn get_logs(&self, user_id: &str) -> RepoResult<Vec<DailyLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LOG_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY saved_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([user_id])?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_log_row(row)?);
        }
        Ok(logs)
    }

    fn put_log(&self, user_id: &str, log: &DailyLog) -> RepoResult<()> {
        log.validate()?;
        let ratings_json = serde_json::to_string(&log.ratings)
            .map_err(|err| RepoError::InvalidData(format!("ratings encode failed: {err}")))?;

        let changed = self.conn.execute(
            "INSERT INTO daily_logs (
                id,
                user_id,
                date_key,
                saved_at,
                phase,
                ratings_json,
                notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                date_key = excluded.date_key,
                saved_at = excluded.saved_at,
                phase = excluded.phase,
                ratings_json = excluded.ratings_json,
                notes = excluded.notes
            WHERE daily_logs.user_id = excluded.user_id;",
            params![
                log.id.to_string(),
                user_id,
                log.date_key.to_string(),
                log.saved_at,
                log.phase.as_str(),
                ratings_json,
                log.notes.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::InvalidData(format!(
                "log {} belongs to another user",
                log.id
            )));
        }
        Ok(())
    }

    fn delete_log(&self, user_id: &str, id: LogId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM daily_logs WHERE id = ?1 AND user_id = ?2;",
            params![id.to_string(), user_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_log_row(row: &Row<'_>) -> RepoResult<DailyLog> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in daily_logs.id"))
    })?;

    let date_text: String = row.get("date_key")?;
    let date_key = DateKey::parse(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date key `{date_text}` in daily_logs.date_key"
        ))
    })?;

    let phase_text: String = row.get("phase")?;
    let phase = CyclePhase::parse(&phase_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid phase `{phase_text}` in daily_logs.phase"))
    })?;

    let ratings_text: String = row.get("ratings_json")?;
    let ratings: SymptomRatings = serde_json::from_str(&ratings_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid daily_logs.ratings_json: {err}"))
    })?;

    let log = DailyLog {
        id,
        date_key,
        saved_at: row.get("saved_at")?,
        phase,
        ratings,
        notes: row.get("notes")?,
    };
    log.validate()?;
    Ok(log)
}
