//! Local scratch slots for reload-resilient drafts.
//!
//! # Responsibility
//! - Store small string values under fixed keys.
//! - Stay separate from the committed log collection.
//!
//! # Invariants
//! - `write_slot` overwrites the previous value for the same key.

use crate::repo::{ensure_table, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Key-value slot storage.
pub trait ScratchStore {
    fn read_slot(&self, key: &str) -> RepoResult<Option<String>>;
    fn write_slot(&self, key: &str, value: &str) -> RepoResult<()>;
}

impl<S: ScratchStore + ?Sized> ScratchStore for &S {
    fn read_slot(&self, key: &str) -> RepoResult<Option<String>> {
        (**self).read_slot(key)
    }

    fn write_slot(&self, key: &str, value: &str) -> RepoResult<()> {
        (**self).write_slot(key, value)
    }
}

/// SQLite-backed scratch store over `scratch_slots`.
pub struct SqliteScratchStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScratchStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table(conn, "scratch_slots")?;
        Ok(Self { conn })
    }
}

impl ScratchStore for SqliteScratchStore<'_> {
    fn read_slot(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM scratch_slots WHERE slot_key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_slot(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO scratch_slots (slot_key, value)
             VALUES (?1, ?2)
             ON CONFLICT(slot_key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }
}
