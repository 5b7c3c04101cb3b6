//! Version store.
//!
//! A two-row key/value table inside the migrated database itself:
//! `version` is the applied schema version, `maxVersion` the highest
//! application version that has ever staged its scripts.

use rusqlite::{params, Connection, OptionalExtension};
use schemagate_shared::constants::{
    INITIAL_MAX_VERSION, META_KEY_MAX_VERSION, META_KEY_VERSION, META_TABLE,
};
use schemagate_shared::{parse_tag, Version};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::StoredVersions;

impl Database {
    /// Read both stored versions, creating and seeding the table on first use
    /// with `version = server_version` and `maxVersion = 0.0.0`.
    ///
    /// With `is_database_new`, any existing meta table is discarded first: it
    /// belongs to a schema that was just recreated from scratch.
    pub fn fetch_versions(
        &self,
        server_version: &Version,
        is_database_new: bool,
    ) -> Result<StoredVersions> {
        let fetch = || -> Result<(String, String)> {
            self.ensure_meta_table(server_version, is_database_new)?;
            let version = read_meta(self.conn(), META_KEY_VERSION)?;
            let max_version = read_meta(self.conn(), META_KEY_MAX_VERSION)?;
            Ok((version, max_version))
        };

        let (version, max_version) = fetch().map_err(|e| match e {
            StoreError::Sqlite(e) => StoreError::Config(format!("version store unavailable: {e}")),
            other => other,
        })?;

        Ok(StoredVersions {
            database_version: parse_tag(&version)?,
            max_version: parse_tag(&max_version)?,
        })
    }

    /// Overwrite `maxVersion`.
    pub fn set_max_version(&self, version: &Version) -> Result<()> {
        write_meta(self.conn(), META_KEY_MAX_VERSION, version)
    }

    /// Overwrite the applied schema version.
    pub fn set_database_version(&self, version: &Version) -> Result<()> {
        write_meta(self.conn(), META_KEY_VERSION, version)
    }

    fn ensure_meta_table(&self, server_version: &Version, is_database_new: bool) -> Result<()> {
        let conn = self.conn();
        let mut exists = table_exists(conn, META_TABLE)?;

        if exists {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {META_TABLE} WHERE key IN (?1, ?2)"),
                params![META_KEY_VERSION, META_KEY_MAX_VERSION],
                |row| row.get(0),
            )?;
            if count < 2 {
                tracing::warn!(table = META_TABLE, "meta table is missing a version row, recreating it");
                drop_meta_table(conn)?;
                exists = false;
            }
        }

        if exists && is_database_new {
            tracing::warn!(table = META_TABLE, "meta table left over from a previous database, recreating it");
            drop_meta_table(conn)?;
            exists = false;
        }

        if !exists {
            conn.execute_batch(&format!(
                "CREATE TABLE {META_TABLE} (
                    key   TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL
                );"
            ))?;
            conn.execute(
                &format!("INSERT INTO {META_TABLE} (key, value) VALUES (?1, ?2), (?3, ?4)"),
                params![
                    META_KEY_VERSION,
                    server_version.to_string(),
                    META_KEY_MAX_VERSION,
                    INITIAL_MAX_VERSION,
                ],
            )?;
            tracing::debug!(table = META_TABLE, version = %server_version, "created meta table");
        }

        Ok(())
    }
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn drop_meta_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {META_TABLE};"))?;
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> Result<String> {
    let value = conn.query_row(
        &format!("SELECT value FROM {META_TABLE} WHERE key = ?1"),
        params![key],
        |row| row.get(0),
    )?;
    Ok(value)
}

fn write_meta(conn: &Connection, key: &str, version: &Version) -> Result<()> {
    let affected = conn.execute(
        &format!("UPDATE {META_TABLE} SET value = ?1 WHERE key = ?2"),
        params![version.to_string(), key],
    )?;
    if affected != 1 {
        return Err(StoreError::Config(format!(
            "meta row {key:?} is missing from {META_TABLE}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_fetch_seeds_new_table() {
        let db = Database::open_in_memory().unwrap();
        let versions = db.fetch_versions(&v("2.1.0"), false).unwrap();
        assert_eq!(versions.database_version, v("2.1.0"));
        assert_eq!(versions.max_version, v("0.0.0"));
    }

    #[test]
    fn test_fetch_reads_existing_rows() {
        let db = Database::open_in_memory().unwrap();
        db.fetch_versions(&v("1.0.0"), false).unwrap();
        db.set_max_version(&v("1.4.0")).unwrap();
        db.set_database_version(&v("1.3.0")).unwrap();

        // The seed is ignored once the table exists.
        let versions = db.fetch_versions(&v("9.9.9"), false).unwrap();
        assert_eq!(versions.database_version, v("1.3.0"));
        assert_eq!(versions.max_version, v("1.4.0"));
    }

    #[test]
    fn test_fetch_repairs_missing_row() {
        let db = Database::open_in_memory().unwrap();
        db.fetch_versions(&v("1.0.0"), false).unwrap();
        db.conn()
            .execute("DELETE FROM migrations_meta WHERE key = 'maxVersion'", [])
            .unwrap();

        let versions = db.fetch_versions(&v("1.2.0"), false).unwrap();
        assert_eq!(versions.database_version, v("1.2.0"));
        assert_eq!(versions.max_version, v("0.0.0"));
    }

    #[test]
    fn test_fetch_recreates_for_new_database() {
        let db = Database::open_in_memory().unwrap();
        db.fetch_versions(&v("1.0.0"), false).unwrap();
        db.set_max_version(&v("1.0.0")).unwrap();

        let versions = db.fetch_versions(&v("2.0.0"), true).unwrap();
        assert_eq!(versions.database_version, v("2.0.0"));
        assert_eq!(versions.max_version, v("0.0.0"));
    }

    #[test]
    fn test_fetch_rejects_garbage_version() {
        let db = Database::open_in_memory().unwrap();
        db.fetch_versions(&v("1.0.0"), false).unwrap();
        db.conn()
            .execute("UPDATE migrations_meta SET value = 'banana' WHERE key = 'version'", [])
            .unwrap();

        let err = db.fetch_versions(&v("1.0.0"), false).unwrap_err();
        assert!(matches!(err, StoreError::VersionParse(_)));
    }

    #[test]
    fn test_set_version_without_table_fails() {
        let db = Database::open_in_memory().unwrap();
        let err = db.set_database_version(&v("1.0.0")).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
