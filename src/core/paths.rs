//! Path handling for the watch root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, TwError};

/// Canonicalize the CLI-supplied root into the absolute directory path the
/// watch cache is keyed under.
///
/// Every cache entry is built by joining child names onto this value, so
/// symlinks and `..` segments must be resolved exactly once here; resolving
/// them per-event would race with concurrent renames. A root that does not
/// exist, or names anything other than a directory, is rejected.
pub fn canonical_watch_root(path: &Path) -> Result<PathBuf> {
    let canonical = fs::canonicalize(path).map_err(|_| TwError::NotADirectory {
        path: path.to_path_buf(),
    })?;
    if !canonical.is_dir() {
        return Err(TwError::NotADirectory { path: canonical });
    }
    Ok(canonical)
}
