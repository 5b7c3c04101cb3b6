//! Records persisted by the engine and the report handed back to callers.

use chrono::{DateTime, Utc};
use schemagate_shared::{Direction, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One executed forward migration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Script name (file name without extension).
    pub name: String,
    /// When the `up` operation committed.
    pub executed_at: DateTime<Utc>,
}

/// The two versions kept in the meta table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersions {
    /// Schema version actually applied to the database.
    pub database_version: Version,
    /// Highest application version that ever staged its scripts.
    pub max_version: Version,
}

/// How a call to `run_migrations` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The database was created by this process; nothing to migrate.
    NewDatabase,
    /// Database version already equals the application version.
    UpToDate,
    /// The versions differ but no script falls inside the range.
    NothingToRun,
    /// At least one script ran.
    Applied,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub from_version: String,
    pub to_version: String,
    pub direction: Option<Direction>,
    /// Script names in the order they ran.
    pub applied: Vec<String>,
    pub outcome: RunOutcome,
}
