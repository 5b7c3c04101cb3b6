//! Script discovery.
//!
//! Lists the working directory, derives each script's name and version tag
//! from its file name, and hands the files to a [`ScriptLoader`] in ascending
//! version order.

use std::path::{Path, PathBuf};

use schemagate_shared::constants::SCRIPT_EXTENSION;
use schemagate_shared::{parse_tag, Version};

use crate::error::{Result, StoreError};
use crate::loader::ScriptLoader;
use crate::script::LoadedScript;

/// A script file whose name carries a valid version tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
}

/// Whether `path` names a migration script: a non-hidden regular file with
/// the script extension.
pub fn is_script_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SCRIPT_EXTENSION));
    !hidden && has_ext && path.is_file()
}

/// List the scripts in `dir`, sorted by version (then name).
///
/// Files whose name has no leading version tag are skipped with an error
/// log: they are almost always a packaging mistake, but one bad file should
/// not hide every other script.
pub fn discover(dir: &Path) -> Result<Vec<ScriptFile>> {
    if !dir.is_dir() {
        return Err(StoreError::Config(format!(
            "migrations directory does not exist: {}",
            dir.display()
        )));
    }

    let mut scripts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_script_file(&path) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        match parse_tag(&name) {
            Ok(version) => scripts.push(ScriptFile {
                name,
                version,
                path,
            }),
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "migration script has no usable version tag, ignoring it"
                );
            }
        }
    }

    scripts.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)));
    Ok(scripts)
}

/// Discover and load every script in `dir`, in ascending version order.
pub fn resolve<L: ScriptLoader + ?Sized>(dir: &Path, loader: &L) -> Result<Vec<LoadedScript>> {
    discover(dir)?
        .into_iter()
        .map(|file| loader.load(&file.path, &file.name, &file.version))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SqlScriptLoader;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "-- migrate:up\nSELECT 1;\n").unwrap();
    }

    #[test]
    fn test_discover_sorts_semantically() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "v1.10.0-later.sql",
            "v1.9.0-earlier.sql",
            "1.2.3.sql",
            "v1.9.0-another.sql",
        ] {
            touch(dir.path(), name);
        }

        let names: Vec<_> = discover(dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec!["1.2.3", "v1.9.0-another", "v1.9.0-earlier", "v1.10.0-later"]
        );
    }

    #[test]
    fn test_discover_skips_untagged_hidden_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "v1.0.0-ok.sql");
        touch(dir.path(), "notes.sql");
        touch(dir.path(), ".v1.1.0-hidden.sql");
        touch(dir.path(), "v1.2.0-readme.md");
        std::fs::create_dir(dir.path().join("v1.3.0-dir.sql")).unwrap();

        let found = discover(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "v1.0.0-ok");
        assert_eq!(found[0].version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_discover_missing_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_resolve_propagates_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "v1.0.0-ok.sql");
        std::fs::write(dir.path().join("v1.1.0-broken.sql"), "DROP TABLE x;\n").unwrap();

        let err = resolve(dir.path(), &SqlScriptLoader::new(dir.path())).unwrap_err();
        assert!(matches!(err, StoreError::ScriptLoad { .. }));
    }
}
