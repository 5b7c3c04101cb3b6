//! The migration engine.
//!
//! A [`Migrator`] is built once per process start, before the application
//! hands the database to anything else:
//!
//! 1. [`Migrator::init`] reads the stored versions and, when the running
//!    binary is newer than anything seen before, stages its scripts into the
//!    working directory.
//! 2. [`Migrator::run_migrations`] moves the schema up or down to the running
//!    version.  The database file is backed up before the first script runs;
//!    if any script fails the file is restored and the error is fatal.

use std::path::PathBuf;

use schemagate_shared::constants::{META_TABLE, MIGRATIONS_DIR_NAME};
use schemagate_shared::{parse_tag, Direction, Version};
use uuid::Uuid;

use crate::backup::BackupFiles;
use crate::database::Database;
use crate::error::{OperationError, Result, StoreError};
use crate::loader::{ScriptLoader, SqlScriptLoader};
use crate::models::{MigrationReport, RunOutcome};
use crate::planner::{self, MigrationPlan};
use crate::records::{log_migration, unlog_migration};
use crate::resolver;
use crate::script::{LoadedScript, MigrationContext, ScriptLogger};
use crate::staging::stage_scripts;

/// Where the engine finds its files.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Per-installation config directory; must exist.
    pub config_dir: PathBuf,
    /// Canonical location the scripts ship in.
    pub source_dir: PathBuf,
    /// The database was created from scratch by this process.
    pub is_database_new: bool,
}

impl MigratorConfig {
    pub fn new(config_dir: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            source_dir: source_dir.into(),
            is_database_new: false,
        }
    }

    pub fn database_is_new(mut self, is_new: bool) -> Self {
        self.is_database_new = is_new;
        self
    }

    /// The working directory scripts are staged into and loaded from.
    pub fn migrations_dir(&self) -> PathBuf {
        self.config_dir.join(MIGRATIONS_DIR_NAME)
    }
}

#[derive(Debug, Clone)]
struct Versions {
    server: Version,
    database: Version,
    max: Version,
}

/// A script that failed after the backup was taken.
struct StepFailure {
    script: String,
    source: OperationError,
}

/// Version-gated migration engine over one database file.
pub struct Migrator<L = SqlScriptLoader> {
    db: Option<Database>,
    config: MigratorConfig,
    loader: L,
    versions: Option<Versions>,
}

impl Migrator<SqlScriptLoader> {
    /// Engine loading `.sql` scripts that resolve includes against
    /// `config.source_dir`.
    pub fn new(db: Database, config: MigratorConfig) -> Self {
        let loader = SqlScriptLoader::new(config.source_dir.clone());
        Self::with_loader(db, config, loader)
    }
}

impl<L: ScriptLoader> Migrator<L> {
    pub fn with_loader(db: Database, config: MigratorConfig, loader: L) -> Self {
        Self {
            db: Some(db),
            config,
            loader,
            versions: None,
        }
    }

    /// Read the stored versions and stage scripts if `server_version` is the
    /// newest version this installation has seen.
    pub fn init(&mut self, server_version: &str) -> Result<()> {
        if !self.config.config_dir.is_dir() {
            return Err(StoreError::Config(format!(
                "config path does not exist: {}",
                self.config.config_dir.display()
            )));
        }

        let server = parse_tag(server_version)?;

        let migrations_dir = self.config.migrations_dir();
        std::fs::create_dir_all(&migrations_dir)?;

        let db = self.database()?;
        let stored = db.fetch_versions(&server, self.config.is_database_new)?;
        db.ensure_records_table()?;

        tracing::debug!(
            database_version = %stored.database_version,
            max_version = %stored.max_version,
            server_version = %server,
            "fetched schema versions"
        );

        let mut max = stored.max_version;
        if server > max {
            let staged = stage_scripts(&self.config.source_dir, &migrations_dir)?;
            db.set_max_version(&server)?;
            tracing::info!(
                staged,
                previous_max = %max,
                max_version = %server,
                "registered migration scripts for a new release"
            );
            max = server.clone();
        }

        self.versions = Some(Versions {
            server,
            database: stored.database_version,
            max,
        });
        Ok(())
    }

    /// Bring the schema to the server version.
    ///
    /// Errors for which [`StoreError::is_fatal`] holds mean the run failed
    /// after the backup was taken.  The database file has been restored (or
    /// is unusable, for [`StoreError::RestoreFailed`]), the connection is
    /// closed, and the caller must stop the process.
    pub fn run_migrations(&mut self) -> Result<MigrationReport> {
        let versions = self.versions.clone().ok_or_else(|| {
            StoreError::Config("migrator is not initialized, call init() first".to_string())
        })?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "migration_run",
            %run_id,
            from = %versions.database,
            to = %versions.server
        );
        let _enter = span.enter();

        let mut report = MigrationReport {
            run_id,
            from_version: versions.database.to_string(),
            to_version: versions.server.to_string(),
            direction: None,
            applied: Vec::new(),
            outcome: RunOutcome::UpToDate,
        };

        if self.config.is_database_new {
            tracing::info!("database is new, skipping migrations");
            report.outcome = RunOutcome::NewDatabase;
            return Ok(report);
        }

        let Some(direction) = planner::direction(&versions.database, &versions.server) else {
            tracing::info!("database is already up to date");
            return Ok(report);
        };
        report.direction = Some(direction);

        let scripts = resolver::resolve(&self.config.migrations_dir(), &self.loader)?;
        let executed = self.database()?.executed_names()?;
        let plan = planner::plan(
            scripts.iter().map(|s| (s.name.as_str(), &s.version)),
            &executed,
            &versions.database,
            &versions.server,
        )
        .unwrap_or(MigrationPlan {
            direction,
            steps: Vec::new(),
        });

        if plan.is_empty() {
            tracing::info!(%direction, "no migrations to run");
            self.database()?.set_database_version(&versions.server)?;
            report.outcome = RunOutcome::NothingToRun;
        } else {
            tracing::info!(%direction, migrations = ?plan.steps, "migrating database");

            let files = BackupFiles::for_database(&self.live_path()?);
            files.create()?;

            let outcome = self.apply(&scripts, &plan).and_then(|()| {
                self.database()
                    .and_then(|db| db.set_database_version(&versions.server))
                    .map_err(|e| StepFailure {
                        script: META_TABLE.to_string(),
                        source: e.into(),
                    })
            });
            if let Err(failure) = outcome {
                return Err(self.recover(&files, failure, direction, &versions));
            }

            if let Err(e) = files.discard() {
                tracing::warn!(
                    backup = %files.backup().display(),
                    error = %e,
                    "could not delete the database backup"
                );
            }

            report.applied = plan.steps;
            report.outcome = RunOutcome::Applied;
        }

        if let Some(v) = self.versions.as_mut() {
            v.database = versions.server.clone();
        }

        tracing::info!(
            from = %report.from_version,
            to = %report.to_version,
            applied = ?report.applied,
            "migrations complete"
        );
        Ok(report)
    }

    /// Server version given to [`Self::init`].
    pub fn server_version(&self) -> Option<&Version> {
        self.versions.as_ref().map(|v| &v.server)
    }

    /// Applied schema version as last read or written.
    pub fn database_version(&self) -> Option<&Version> {
        self.versions.as_ref().map(|v| &v.database)
    }

    pub fn max_version(&self) -> Option<&Version> {
        self.versions.as_ref().map(|v| &v.max)
    }

    /// Hand the connection over to the application.  `None` after a fatal
    /// failure closed it.
    pub fn into_database(self) -> Option<Database> {
        self.db
    }

    fn database(&self) -> Result<&Database> {
        self.db.as_ref().ok_or_else(|| {
            StoreError::Config("database connection was closed by a failed migration".to_string())
        })
    }

    fn live_path(&self) -> Result<PathBuf> {
        self.database()?
            .path()
            .ok_or_else(|| StoreError::Config("database has no file to back up".to_string()))
    }

    fn apply(
        &self,
        scripts: &[LoadedScript],
        plan: &MigrationPlan,
    ) -> std::result::Result<(), StepFailure> {
        for name in &plan.steps {
            let failure = |source: OperationError| StepFailure {
                script: name.clone(),
                source,
            };
            let script = scripts
                .iter()
                .find(|s| &s.name == name)
                .ok_or_else(|| failure(format!("script {name} vanished from the plan").into()))?;
            let db = self.database().map_err(|e| failure(e.into()))?;
            run_script(db, script, plan.direction).map_err(failure)?;
        }
        Ok(())
    }

    fn recover(
        &mut self,
        files: &BackupFiles,
        failure: StepFailure,
        direction: Direction,
        versions: &Versions,
    ) -> StoreError {
        tracing::error!(
            script = %failure.script,
            %direction,
            from = %versions.database,
            to = %versions.server,
            error = %failure.source,
            "migration failed"
        );

        if let Some(db) = self.db.take() {
            if let Err(e) = db.close() {
                tracing::warn!(error = %e, "closing the database after a failed migration reported an error");
            }
        }
        self.versions = None;

        match files.restore() {
            Ok(_) => StoreError::MigrationFailed {
                script: failure.script,
                direction,
                from: versions.database.to_string(),
                to: versions.server.to_string(),
                failed_path: files.failed().to_path_buf(),
                source: failure.source,
            },
            Err(source) => {
                tracing::error!(
                    path = %files.live().display(),
                    backup = %files.backup().display(),
                    error = %source,
                    "could not restore the database from the backup"
                );
                StoreError::RestoreFailed {
                    script: failure.script,
                    cause: failure.source.to_string(),
                    path: files.live().to_path_buf(),
                    source,
                }
            }
        }
    }
}

/// Run one script in its own transaction together with its bookkeeping row.
fn run_script(
    db: &Database,
    script: &LoadedScript,
    direction: Direction,
) -> std::result::Result<(), OperationError> {
    let tx = db.conn().unchecked_transaction()?;
    let logger = ScriptLogger::new(script.name.as_str(), direction);

    match script.operation(direction) {
        Some(op) => {
            logger.info("migration begin");
            op.run(&MigrationContext::new(&tx, logger.clone()))?;
            logger.info("migration end");
        }
        None => logger.debug("script has no operation in this direction, nothing to do"),
    }

    match direction {
        Direction::Up => log_migration(&tx, &script.name)?,
        Direction::Down => {
            unlog_migration(&tx, &script.name)?;
        }
    }

    tx.commit()?;
    Ok(())
}
