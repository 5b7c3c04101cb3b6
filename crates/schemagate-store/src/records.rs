//! Bookkeeping of executed forward migrations.
//!
//! A row is inserted when a script's `up` commits and removed when its `down`
//! commits.  The rows only gate the forward direction; see
//! [`crate::planner`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use schemagate_shared::constants::RECORDS_TABLE;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::meta::table_exists;
use crate::models::MigrationRecord;

impl Database {
    /// Create the records table if it does not exist yet.
    pub fn ensure_records_table(&self) -> Result<()> {
        self.conn().execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {RECORDS_TABLE} (
                name        TEXT PRIMARY KEY NOT NULL,
                executed_at TEXT NOT NULL
            );"
        ))?;
        Ok(())
    }

    /// All executed migrations, ordered by name.  Read-only: a database
    /// without the table has executed nothing.
    pub fn executed_migrations(&self) -> Result<Vec<MigrationRecord>> {
        if !table_exists(self.conn(), RECORDS_TABLE)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn().prepare(&format!(
            "SELECT name, executed_at FROM {RECORDS_TABLE} ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map([], row_to_record)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Names of all executed migrations.
    pub fn executed_names(&self) -> Result<HashSet<String>> {
        Ok(self
            .executed_migrations()?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }
}

/// Record `name` as executed.  Re-running an `up` refreshes the timestamp.
pub(crate) fn log_migration(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        &format!("INSERT OR REPLACE INTO {RECORDS_TABLE} (name, executed_at) VALUES (?1, ?2)"),
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Forget `name`.  Returns whether a row existed.
pub(crate) fn unlog_migration(conn: &Connection, name: &str) -> Result<bool> {
    let affected = conn.execute(
        &format!("DELETE FROM {RECORDS_TABLE} WHERE name = ?1"),
        params![name],
    )?;
    Ok(affected > 0)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MigrationRecord> {
    let name: String = row.get(0)?;
    let executed_str: String = row.get(1)?;

    let executed_at = DateTime::parse_from_rfc3339(&executed_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(MigrationRecord { name, executed_at })
}
