//! # schemagate-store
//!
//! Version-gated schema migrations for a SQLite database file.
//!
//! The engine keeps the applied schema version inside the database, picks
//! the scripts between that version and the running application's version,
//! and runs them forward or backward.  The database file is copied aside
//! before the first script runs and restored if any script fails, so a run
//! either completes or leaves the file exactly as it was.

pub mod backup;
pub mod database;
pub mod loader;
pub mod meta;
pub mod migrator;
pub mod models;
pub mod planner;
pub mod records;
pub mod resolver;
pub mod script;
pub mod staging;

mod error;

pub use database::Database;
pub use error::{OperationError, Result, StoreError};
pub use loader::{ScriptLoader, SqlScriptLoader};
pub use migrator::{Migrator, MigratorConfig};
pub use models::*;
pub use planner::MigrationPlan;
pub use script::{FnOperation, LoadedScript, MigrationContext, Operation, ScriptLogger, SqlOperation};
