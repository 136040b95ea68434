//! Check-in schema steps, tracked through `PRAGMA user_version`.
//!
//! Step `n` moves the schema from version `n - 1` to `n`; steps are never
//! edited once released.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

/// `(target_version, sql)` pairs, contiguous from 1.
const SCHEMA_STEPS: [(u32, &str); 2] = [
    (1, include_str!("0001_daily_logs.sql")),
    (2, include_str!("0002_scratch_slots.sql")),
];

/// Returns the latest schema version this build can write.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |(version, _)| *version)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer
///   build.
/// - `DbError::Sqlite` when a step fails; the whole upgrade is rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stored: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if stored > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest,
        });
    }

    let pending = pending_steps(stored);
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in pending {
        debug!("event=db_migrate_step module=db status=start version={version}");
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={stored} to_version={latest}");
    Ok(())
}

fn pending_steps(stored: u32) -> Vec<(u32, &'static str)> {
    SCHEMA_STEPS
        .iter()
        .copied()
        .filter(|(version, _)| *version > stored)
        .collect()
}
