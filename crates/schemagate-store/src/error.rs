use std::path::PathBuf;

use schemagate_shared::{Direction, VersionError};
use thiserror::Error;

/// Boxed error returned by a migration operation.
pub type OperationError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Missing config path, engine used before `init`, or version store
    /// unreachable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The application version or a stored version is not a version tag.
    #[error("Version error: {0}")]
    VersionParse(#[from] VersionError),

    /// A script file could not be loaded.  Raised before any backup is taken.
    #[error("Failed to load migration script {path}: {reason}")]
    ScriptLoad { path: PathBuf, reason: String },

    /// A script failed while running.  The database has been restored from
    /// the pre-migration backup and the broken file kept at `failed_path`.
    #[error("Migration {script} ({direction}, {from} -> {to}) failed: {source}")]
    MigrationFailed {
        script: String,
        direction: Direction,
        from: String,
        to: String,
        failed_path: PathBuf,
        #[source]
        source: OperationError,
    },

    /// The pre-migration backup copy could not be written.
    #[error("Failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A script failed and the backup could not be put back in place.  The
    /// database file is in an unknown state.
    #[error("Migration {script} failed ({cause}) and restoring {path} failed: {source}")]
    RestoreFailed {
        script: String,
        cause: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (staging copies, directory listing).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error happened after the backup was taken.  The process
    /// must not keep running against the database after a fatal error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MigrationFailed { .. } | Self::Backup { .. } | Self::RestoreFailed { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!StoreError::Config("x".into()).is_fatal());
        assert!(!StoreError::ScriptLoad {
            path: PathBuf::from("a.sql"),
            reason: "bad".into()
        }
        .is_fatal());

        let backup = StoreError::Backup {
            path: PathBuf::from("db.sqlite"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(backup.is_fatal());
    }
}
