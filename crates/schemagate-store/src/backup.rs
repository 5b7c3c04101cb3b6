//! File-level safety net around a migration run.
//!
//! Before the first script runs the live database file is copied next to
//! itself (`db.sqlite` -> `db.backup.sqlite`).  On success the copy is
//! deleted.  On failure the broken live file is moved aside to
//! `db.failed.sqlite` for inspection and the copy is moved back into place.

use std::fs;
use std::path::{Path, PathBuf};

use schemagate_shared::constants::{BACKUP_TAG, FAILED_TAG};

use crate::error::{Result, StoreError};

/// The three file paths involved in protecting one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFiles {
    live: PathBuf,
    backup: PathBuf,
    failed: PathBuf,
}

impl BackupFiles {
    pub fn for_database(live: &Path) -> Self {
        Self {
            live: live.to_path_buf(),
            backup: sibling_path(live, BACKUP_TAG),
            failed: sibling_path(live, FAILED_TAG),
        }
    }

    pub fn live(&self) -> &Path {
        &self.live
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    pub fn failed(&self) -> &Path {
        &self.failed
    }

    /// Copy the live file to the backup path, overwriting a stale backup.
    pub fn create(&self) -> Result<u64> {
        let bytes = fs::copy(&self.live, &self.backup).map_err(|source| StoreError::Backup {
            path: self.live.clone(),
            source,
        })?;
        tracing::info!(
            backup = %self.backup.display(),
            bytes,
            "created a backup of the database"
        );
        Ok(bytes)
    }

    /// Delete the backup after a successful run.
    pub fn discard(&self) -> Result<()> {
        match fs::remove_file(&self.backup) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Move the live file to the failed path and the backup back to the live
    /// path.  The connection to the live file must be closed first.
    ///
    /// Returns whether the failed file of an earlier run was replaced.
    pub fn restore(&self) -> std::io::Result<bool> {
        let mut replaced = false;
        if self.live.exists() {
            if self.failed.exists() {
                tracing::warn!(
                    failed = %self.failed.display(),
                    "replacing the failed database left by an earlier run"
                );
                fs::remove_file(&self.failed)?;
                replaced = true;
            }
            fs::rename(&self.live, &self.failed)?;
            tracing::info!(failed = %self.failed.display(), "saved the failed database");
        }

        fs::rename(&self.backup, &self.live)?;
        tracing::info!(path = %self.live.display(), "restored the database from the backup");
        Ok(replaced)
    }
}

/// `dir/name.ext` -> `dir/name.<tag>.ext` (`dir/name.<tag>` without an
/// extension).
pub fn sibling_path(path: &Path, tag: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{tag}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}"),
    };
    path.with_file_name(name)
}
