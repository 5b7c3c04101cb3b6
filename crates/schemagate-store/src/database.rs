//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] to a file on disk.
//! Unlike a plain connection it can be closed explicitly, which the migrator
//! needs before it swaps files around on a failed run.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::Result;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;

        // Backups are plain file copies, so all committed state must live in
        // the main database file.
        conn.pragma_update(None, "journal_mode", "DELETE")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self { conn })
    }

    /// Open a private in-memory database.  It has no file and therefore
    /// cannot be backed up; only useful for the version store and planner.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    ///
    /// In-memory databases report `None` (rusqlite yields an empty path for
    /// them).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Close the connection, releasing the file handle.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}
