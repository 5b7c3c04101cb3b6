//! Script loading.
//!
//! [`ScriptLoader`] turns one script file into a [`LoadedScript`].  The
//! default [`SqlScriptLoader`] reads SQL files split into sections:
//!
//! ```sql
//! -- migrate:up
//! ALTER TABLE items ADD COLUMN rating INTEGER;
//! -- migrate:down
//! ALTER TABLE items DROP COLUMN rating;
//! ```
//!
//! Scripts are executed from the per-installation working directory but
//! behave as if they still lived in the canonical source directory:
//! `-- migrate:include <path>` is resolved against the source directory, never
//! against the staged copy.

use std::path::{Component, Path, PathBuf};

use schemagate_shared::{Direction, Version};

use crate::error::{Result, StoreError};
use crate::script::{LoadedScript, SqlOperation};

/// Loads a single migration script.
pub trait ScriptLoader {
    /// Load the script at `path`.  `name` and `version` were already derived
    /// from the file name by the resolver.
    fn load(&self, path: &Path, name: &str, version: &Version) -> Result<LoadedScript>;
}

/// Loader for sectioned `.sql` scripts.
#[derive(Debug, Clone)]
pub struct SqlScriptLoader {
    source_dir: PathBuf,
}

impl SqlScriptLoader {
    /// `source_dir` is the canonical location the scripts ship in; includes
    /// resolve against it.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Resolve an include path inside the source directory.  Absolute paths
    /// and `..` components are rejected.
    fn resolve_include(&self, include: &str) -> std::result::Result<PathBuf, String> {
        let mut resolved = self.source_dir.clone();
        let mut pushed = false;
        for component in Path::new(include).components() {
            match component {
                Component::Normal(c) => {
                    resolved.push(c);
                    pushed = true;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(format!("include {include:?} escapes the source directory"));
                }
            }
        }
        if !pushed {
            return Err("include directive without a path".to_string());
        }
        Ok(resolved)
    }

    fn parse(&self, text: &str) -> std::result::Result<Sections, String> {
        let mut sections = Sections::default();
        let mut current: Option<Direction> = None;

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let trimmed = line.trim();

            if let Some(directive) = parse_directive(trimmed) {
                let mut parts = directive.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some("up"), None) => {
                        sections.open(Direction::Up, lineno)?;
                        current = Some(Direction::Up);
                    }
                    (Some("down"), None) => {
                        sections.open(Direction::Down, lineno)?;
                        current = Some(Direction::Down);
                    }
                    (Some("include"), arg) => {
                        let direction = current.ok_or_else(|| {
                            format!("line {lineno}: include outside of an up/down section")
                        })?;
                        let path = self.resolve_include(arg.unwrap_or_default())?;
                        let body = std::fs::read_to_string(&path).map_err(|e| {
                            format!("line {lineno}: cannot read include {}: {e}", path.display())
                        })?;
                        sections.push(direction, &body);
                    }
                    _ => return Err(format!("line {lineno}: unknown directive {trimmed:?}")),
                }
                continue;
            }

            match current {
                Some(direction) => sections.push(direction, line),
                None if trimmed.is_empty() || trimmed.starts_with("--") => {}
                None => {
                    return Err(format!(
                        "line {lineno}: SQL outside of an up/down section"
                    ))
                }
            }
        }

        if sections.up.is_none() && sections.down.is_none() {
            return Err("no migrate:up or migrate:down section".to_string());
        }
        Ok(sections)
    }
}

impl ScriptLoader for SqlScriptLoader {
    fn load(&self, path: &Path, name: &str, version: &Version) -> Result<LoadedScript> {
        let load_error = |reason: String| StoreError::ScriptLoad {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let sections = self.parse(&text).map_err(load_error)?;

        let mut script = LoadedScript::new(name, version.clone(), path);
        if let Some(sql) = sections.up {
            script = script.with_up(SqlOperation::new(sql));
        }
        if let Some(sql) = sections.down {
            script = script.with_down(SqlOperation::new(sql));
        }
        Ok(script)
    }
}

#[derive(Default)]
struct Sections {
    up: Option<String>,
    down: Option<String>,
}

impl Sections {
    fn slot(&mut self, direction: Direction) -> &mut Option<String> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    fn open(&mut self, direction: Direction, lineno: usize) -> std::result::Result<(), String> {
        let slot = self.slot(direction);
        if slot.is_some() {
            return Err(format!("line {lineno}: duplicate migrate:{direction} section"));
        }
        *slot = Some(String::new());
        Ok(())
    }

    fn push(&mut self, direction: Direction, text: &str) {
        if let Some(buf) = self.slot(direction) {
            buf.push_str(text);
            if !text.ends_with('\n') {
                buf.push('\n');
            }
        }
    }
}

/// `-- migrate:up` -> `Some("up")`.
fn parse_directive(line: &str) -> Option<&str> {
    line.strip_prefix("--")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix("migrate:"))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{MigrationContext, ScriptLogger};

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    fn load(loader: &SqlScriptLoader, path: &Path) -> Result<LoadedScript> {
        loader.load(path, "v1.0.0-test", &Version::new(1, 0, 0))
    }

    #[test]
    fn test_load_both_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "v1.0.0-test.sql",
            "-- Adds the widgets table.\n\
             -- migrate:up\n\
             CREATE TABLE widgets (id INTEGER PRIMARY KEY);\n\
             -- migrate:down\n\
             DROP TABLE IF EXISTS widgets;\n",
        );

        let script = load(&SqlScriptLoader::new(dir.path()), &path).unwrap();
        assert!(script.operation(Direction::Up).is_some());
        assert!(script.operation(Direction::Down).is_some());

        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let ctx = MigrationContext::new(&conn, ScriptLogger::new("t", Direction::Up));
        script.operation(Direction::Up).unwrap().run(&ctx).unwrap();
        script.operation(Direction::Down).unwrap().run(&ctx).unwrap();
    }

    #[test]
    fn test_load_up_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "v1.0.0-test.sql", "--migrate:up\nSELECT 1;\n");

        let script = load(&SqlScriptLoader::new(dir.path()), &path).unwrap();
        assert!(script.operation(Direction::Up).is_some());
        assert!(script.operation(Direction::Down).is_none());
    }

    #[test]
    fn test_include_resolves_against_source_dir() {
        let source = tempfile::tempdir().unwrap();
        let staged = tempfile::tempdir().unwrap();
        write(
            source.path(),
            "includes/drop.sql",
            "DROP TABLE IF EXISTS widgets;",
        );
        let path = write(
            staged.path(),
            "v1.0.0-test.sql",
            "-- migrate:up\nCREATE TABLE widgets (id INTEGER);\n-- migrate:down\n-- migrate:include includes/drop.sql\n",
        );

        let script = load(&SqlScriptLoader::new(source.path()), &path).unwrap();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let ctx = MigrationContext::new(&conn, ScriptLogger::new("t", Direction::Up));
        script.operation(Direction::Up).unwrap().run(&ctx).unwrap();
        script.operation(Direction::Down).unwrap().run(&ctx).unwrap();

        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'widgets'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(exists, 0);
    }

    #[test]
    fn test_include_cannot_escape_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "v1.0.0-test.sql",
            "-- migrate:up\n-- migrate:include ../secrets.sql\n",
        );

        let err = load(&SqlScriptLoader::new(dir.path()), &path).unwrap_err();
        assert!(matches!(err, StoreError::ScriptLoad { .. }));
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn test_missing_include_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "v1.0.0-test.sql",
            "-- migrate:up\n-- migrate:include nope.sql\n",
        );
        assert!(load(&SqlScriptLoader::new(dir.path()), &path).is_err());
    }

    #[test]
    fn test_rejects_sql_outside_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "v1.0.0-test.sql",
            "CREATE TABLE t (id INTEGER);\n-- migrate:up\nSELECT 1;\n",
        );
        let err = load(&SqlScriptLoader::new(dir.path()), &path).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_rejects_duplicate_and_unknown_directives() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SqlScriptLoader::new(dir.path());

        let dup = write(dir.path(), "dup.sql", "-- migrate:up\n-- migrate:up\n");
        assert!(load(&loader, &dup).unwrap_err().to_string().contains("duplicate"));

        let unknown = write(dir.path(), "unknown.sql", "-- migrate:sideways\n");
        assert!(load(&loader, &unknown).unwrap_err().to_string().contains("unknown"));

        let empty = write(dir.path(), "empty.sql", "-- nothing here\n");
        assert!(load(&loader, &empty).is_err());
    }

    #[test]
    fn test_unreadable_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&SqlScriptLoader::new(dir.path()), &dir.path().join("missing.sql"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ScriptLoad { .. }));
    }
}
