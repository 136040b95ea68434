//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow storage contracts the log manager depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Log writes must pass `DailyLog::validate()` before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories refuse connections that are missing their tables.

use crate::db::DbError;
use crate::model::daily_log::{LogId, LogValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod log_repo;
pub mod scratch_store;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by log and scratch storage.
#[derive(Debug)]
pub enum RepoError {
    Validation(LogValidationError),
    Db(DbError),
    NotFound(LogId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    /// Failure from a non-SQLite backend (remote store, test double).
    Backend(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "daily log not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted log data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "connection is not migrated: missing table `{table}`")
            }
            Self::Backend(message) => write!(f, "storage backend error: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LogValidationError> for RepoError {
    fn from(value: LogValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn ensure_table(conn: &Connection, table: &'static str) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::MissingRequiredTable(table))
    }
}
