/// Key/value table holding the applied and highest-seen schema versions.
pub const META_TABLE: &str = "migrations_meta";

/// Meta row key for the currently applied schema version.
pub const META_KEY_VERSION: &str = "version";

/// Meta row key for the highest version that ever staged its scripts.
pub const META_KEY_MAX_VERSION: &str = "maxVersion";

/// Bookkeeping table with one row per executed forward migration.
pub const RECORDS_TABLE: &str = "migration_records";

/// `maxVersion` seeded into a freshly created meta table.
pub const INITIAL_MAX_VERSION: &str = "0.0.0";

/// Name of the per-installation working directory inside the config path.
pub const MIGRATIONS_DIR_NAME: &str = "migrations";

/// Extension of migration script files (without the dot).
pub const SCRIPT_EXTENSION: &str = "sql";

/// Tag inserted before the extension of the pre-migration copy.
pub const BACKUP_TAG: &str = "backup";

/// Tag inserted before the extension of a database that failed to migrate.
pub const FAILED_TAG: &str = "failed";

/// Default database file name inside the config path.
pub const DEFAULT_DATABASE_FILE: &str = "schemagate.sqlite";
