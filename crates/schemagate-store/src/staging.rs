//! Staging of released scripts into the per-installation working directory.

use std::path::Path;

use crate::error::Result;
use crate::resolver::is_script_file;

/// Copy every script in `source_dir` into `target_dir`, overwriting files of
/// the same name.  Nothing in `target_dir` is ever deleted.  A missing source
/// directory stages nothing.
pub fn stage_scripts(source_dir: &Path, target_dir: &Path) -> Result<usize> {
    if !source_dir.is_dir() {
        tracing::warn!(
            source = %source_dir.display(),
            "migration source directory does not exist, nothing to stage"
        );
        return Ok(0);
    }

    std::fs::create_dir_all(target_dir)?;

    let mut copied = 0;
    for entry in std::fs::read_dir(source_dir)? {
        let path = entry?.path();
        if !is_script_file(&path) {
            continue;
        }
        if let Some(file_name) = path.file_name() {
            std::fs::copy(&path, target_dir.join(file_name))?;
            copied += 1;
        }
    }

    tracing::debug!(
        source = %source_dir.display(),
        target = %target_dir.display(),
        copied,
        "staged migration scripts"
    );
    Ok(copied)
}
