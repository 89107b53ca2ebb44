use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// Files directly inside `dir` whose extension matches `ext` (case-insensitive), sorted.
pub fn list_files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Size in bytes, or `None` when `path` is not a regular file.
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Move `origin` to `destination`.
///
/// An existing destination is only overwritten when `replace` is set; it is
/// removed first and `origin` renamed into place. Returns whether the move happened.
pub fn move_file(origin: &Path, destination: &Path, replace: bool) -> Result<bool> {
    if destination.is_file() {
        if !replace {
            return Ok(false);
        }
        fs::remove_file(destination)?;
    }
    fs::rename(origin, destination)?;
    Ok(true)
}

/// What happened while resetting a working directory.
#[derive(Debug, Default, Clone)]
pub struct ResetReport {
    pub removed_files: usize,
    pub errors: Vec<String>,
}

/// Delete the files of `dir`, optionally remove the directory itself, and make sure it exists.
///
/// Individual failures are logged and collected; the reset carries on.
pub fn reset_directory(dir: &Path, remove_dir: bool) -> Result<ResetReport> {
    let mut report = ResetReport::default();

    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("cannot list {}: {e}", dir.display());
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => report.removed_files += 1,
                Err(e) => {
                    warn!("cannot remove {}: {e}", path.display());
                    report.errors.push(format!("{}: {e}", path.display()));
                }
            }
        }

        if remove_dir && let Err(e) = fs::remove_dir_all(dir) {
            warn!("cannot remove directory {}: {e}", dir.display());
            report.errors.push(format!("{}: {e}", dir.display()));
        }
    }

    fs::create_dir_all(dir)?;
    Ok(report)
}
