//! Runner configuration loaded from environment variables.
//!
//! Every setting has a default so a local build can start with zero
//! configuration.

use std::path::PathBuf;

use directories::ProjectDirs;
use schemagate_shared::constants::DEFAULT_DATABASE_FILE;

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Per-installation config directory holding the database and the
    /// staged scripts.
    /// Env: `CONFIG_PATH`
    /// Default: the platform data directory (`~/.local/share/schemagate` on
    /// Linux), or `./config` if there is none.
    pub config_path: PathBuf,

    /// Canonical location the migration scripts ship in.
    /// Env: `MIGRATIONS_SOURCE_DIR`
    /// Default: `./migrations`
    pub migrations_source_dir: PathBuf,

    /// Database file name inside `config_path`.
    /// Env: `DATABASE_FILE`
    /// Default: `schemagate.sqlite`
    pub database_file: String,

    /// Version the schema is migrated to.
    /// Env: `SERVER_VERSION`
    /// Default: this binary's package version.
    pub server_version: String,

    /// Print the run report as a single JSON line on stdout.
    /// Env: `REPORT_JSON` (true/false)
    /// Default: `false`
    pub report_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let config_path = ProjectDirs::from("com", "schemagate", "schemagate")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./config"));

        Self {
            config_path,
            migrations_source_dir: PathBuf::from("./migrations"),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            report_json: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("CONFIG_PATH").filter(|p| !p.is_empty()) {
            config.config_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("MIGRATIONS_SOURCE_DIR").filter(|p| !p.is_empty()) {
            config.migrations_source_dir = PathBuf::from(path);
        }

        if let Some(name) = lookup("DATABASE_FILE") {
            if is_plain_file_name(&name) {
                config.database_file = name;
            } else {
                tracing::warn!(value = %name, "Invalid DATABASE_FILE, using default");
            }
        }

        if let Some(version) = lookup("SERVER_VERSION").filter(|v| !v.is_empty()) {
            config.server_version = version;
        }

        if let Some(val) = lookup("REPORT_JSON") {
            config.report_json = val == "true" || val == "1";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Full path of the live database file.
    pub fn database_path(&self) -> PathBuf {
        self.config_path.join(&self.database_file)
    }
}

/// A bare file name: no separators, not empty, not `.`/`..`.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
