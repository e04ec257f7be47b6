//! Discovery of the files served from a root directory

use std::path::PathBuf;

use walkdir::WalkDir;

use crate::io::is_temp_file;
use crate::{ConfigRoot, Error, Result};

/// Collect every regular file under the root, recursively.
///
/// Directories are skipped, as are temporary files left behind by an
/// interrupted [`write_atomic`](crate::io::write_atomic). The result is sorted.
pub fn discover_files(root: &ConfigRoot) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root.path()).follow_links(false) {
        let entry = entry.map_err(|e| Error::Walk {
            path: e
                .path()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| root.path().to_path_buf()),
            message: e.to_string(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        if is_temp_file(entry.path()) {
            tracing::debug!(path = %entry.path().display(), "skipping leftover temporary file");
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}
