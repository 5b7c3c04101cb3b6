//! # schemagate-server
//!
//! Start-up migration runner.
//!
//! Run once per process start, before the application opens its database to
//! anything else:
//! - loads configuration from the environment
//! - brings the schema of the database file up (or down) to the running
//!   version
//! - exits with code 1 on any failure; a failed migration has already been
//!   rolled back to the pre-migration file by the time the process exits

mod config;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use schemagate_store::{Database, MigrationReport, Migrator, MigratorConfig, StoreError};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,schemagate_store=debug,schemagate_server=debug")
            }),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // Migrations block on SQLite and the filesystem; keep them off the
    // async workers.
    let run_config = config.clone();
    let result = tokio::task::spawn_blocking(move || migrate(&run_config)).await?;

    match result {
        Ok(report) => {
            if config.report_json {
                println!("{}", serde_json::to_string(&report)?);
            }
            info!(
                version = %report.to_version,
                outcome = ?report.outcome,
                "Database schema is ready"
            );
            Ok(())
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Migration failed, refusing to start against this database");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Could not prepare the database");
            Err(e.into())
        }
    }
}

fn migrate(config: &ServerConfig) -> Result<MigrationReport, StoreError> {
    std::fs::create_dir_all(&config.config_path)?;

    let db_path = config.database_path();
    let is_database_new = !db_path.exists();
    let db = Database::open_at(&db_path)?;

    let migrator_config = MigratorConfig::new(&config.config_path, &config.migrations_source_dir)
        .database_is_new(is_database_new);
    let mut migrator = Migrator::new(db, migrator_config);

    migrator.init(&config.server_version)?;
    let report = migrator.run_migrations()?;

    if let Some(db) = migrator.into_database() {
        db.close()?;
    }
    Ok(report)
}
