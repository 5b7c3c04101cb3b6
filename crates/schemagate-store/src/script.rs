//! Migration scripts as the engine sees them.
//!
//! A script is a name carrying a version tag plus up to two operations.  The
//! engine never looks inside an operation; it only runs it against a
//! [`MigrationContext`] and treats an `Err` as failure.

use std::fmt;
use std::path::PathBuf;

use rusqlite::Connection;
use schemagate_shared::{Direction, Version};

use crate::error::OperationError;

/// Result of running one operation.
pub type OperationResult = std::result::Result<(), OperationError>;

/// One direction of a migration script.
pub trait Operation: Send + Sync {
    fn run(&self, ctx: &MigrationContext<'_>) -> OperationResult;
}

/// Raw SQL executed as a single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlOperation {
    sql: String,
}

impl SqlOperation {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl Operation for SqlOperation {
    fn run(&self, ctx: &MigrationContext<'_>) -> OperationResult {
        ctx.schema().execute_batch(&self.sql)?;
        Ok(())
    }
}

/// Operation backed by a Rust closure.
pub struct FnOperation<F>(F);

impl<F> FnOperation<F>
where
    F: Fn(&MigrationContext<'_>) -> OperationResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(&MigrationContext<'_>) -> OperationResult + Send + Sync,
{
    fn run(&self, ctx: &MigrationContext<'_>) -> OperationResult {
        (self.0)(ctx)
    }
}

/// What a running operation can touch: the schema connection and a logger.
pub struct MigrationContext<'a> {
    schema: &'a Connection,
    logger: ScriptLogger,
}

impl<'a> MigrationContext<'a> {
    pub fn new(schema: &'a Connection, logger: ScriptLogger) -> Self {
        Self { schema, logger }
    }

    /// Connection to issue schema operations on.  It is inside the script's
    /// transaction; operations must not `BEGIN`/`COMMIT` themselves.
    pub fn schema(&self) -> &Connection {
        self.schema
    }

    pub fn logger(&self) -> &ScriptLogger {
        &self.logger
    }
}

/// Logger handed to scripts.  Every event carries the migration name and
/// direction.
#[derive(Debug, Clone)]
pub struct ScriptLogger {
    migration: String,
    direction: Direction,
}

impl ScriptLogger {
    pub fn new(migration: impl Into<String>, direction: Direction) -> Self {
        Self {
            migration: migration.into(),
            direction,
        }
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(migration = %self.migration, direction = %self.direction, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(migration = %self.migration, direction = %self.direction, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(migration = %self.migration, direction = %self.direction, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(migration = %self.migration, direction = %self.direction, "{message}");
    }
}

/// A loaded script, ready to run.
pub struct LoadedScript {
    /// File name without extension, e.g. `v2.17.3-fk-constraints`.
    pub name: String,
    /// Version tag extracted from `name`.
    pub version: Version,
    /// Where the script was loaded from (the staged copy).
    pub path: PathBuf,
    up: Option<Box<dyn Operation>>,
    down: Option<Box<dyn Operation>>,
}

impl LoadedScript {
    pub fn new(name: impl Into<String>, version: Version, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version,
            path: path.into(),
            up: None,
            down: None,
        }
    }

    pub fn with_up(mut self, op: impl Operation + 'static) -> Self {
        self.up = Some(Box::new(op));
        self
    }

    pub fn with_down(mut self, op: impl Operation + 'static) -> Self {
        self.down = Some(Box::new(op));
        self
    }

    /// The operation for `direction`, if the script defines one.
    pub fn operation(&self, direction: Direction) -> Option<&dyn Operation> {
        match direction {
            Direction::Up => self.up.as_deref(),
            Direction::Down => self.down.as_deref(),
        }
    }
}

impl fmt::Debug for LoadedScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedScript")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("path", &self.path)
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .finish()
    }
}
