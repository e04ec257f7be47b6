//! Atomic write protocol

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Error, Result};

/// Suffix carried by every temporary file produced by [`write_atomic`].
pub const TEMP_SUFFIX: &str = ".tmp";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Durability knobs for [`write_atomic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// Flush the temporary file to disk before renaming it into place.
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self { enable_fsync: true }
    }
}

/// The sub-step of the write protocol that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    CreateDir,
    Create,
    WriteTemp,
    Sync,
    Rename,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::CreateDir => "create directory",
            Self::Create => "create file",
            Self::WriteTemp => "write temporary file",
            Self::Sync => "sync temporary file",
            Self::Rename => "rename",
        };
        f.write_str(step)
    }
}

/// Write content atomically to a file.
///
/// Creates the parent directory tree, writes to a sibling temporary file
/// and renames it over the destination. Concurrent readers observe either
/// the old or the new content. Every writer uses its own temporary file, so
/// concurrent writers to the same destination never interleave bytes; the
/// last rename wins.
pub fn write_atomic(path: &Path, content: &[u8], config: RobustnessConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::write(WriteStep::CreateDir, parent, e))?;
    }

    let temp_path = temp_path_for(path);

    if let Err(err) = write_temp(&temp_path, content, config) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::write(WriteStep::Rename, path, e));
    }

    tracing::trace!(path = %path.display(), bytes = content.len(), "atomic write complete");
    Ok(())
}

fn write_temp(temp_path: &Path, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .map_err(|e| Error::write(WriteStep::WriteTemp, temp_path, e))?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::write(WriteStep::WriteTemp, temp_path, e))?;

    if config.enable_fsync {
        temp_file
            .sync_all()
            .map_err(|e| Error::write(WriteStep::Sync, temp_path, e))?;
    }

    Ok(())
}

/// Temporary sibling used while writing `path`.
///
/// Same directory (so the rename stays on one filesystem), hidden, unique
/// per process and call.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(
        ".{}.{}.{}{}",
        file_name,
        std::process::id(),
        seq,
        TEMP_SUFFIX
    ))
}

/// Whether a path is a temporary file left by [`write_atomic`].
///
/// Only names of the exact shape produced by [`temp_path_for`] match:
/// `.{name}.{pid}.{seq}.tmp`. A user file that merely ends in `.tmp` does not.
pub fn is_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(stem) = name
        .strip_prefix('.')
        .and_then(|n| n.strip_suffix(TEMP_SUFFIX))
    else {
        return false;
    };

    let mut parts = stem.rsplitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(seq), Some(pid), Some(original)) => {
            !original.is_empty() && is_number(seq) && is_number(pid)
        }
        _ => false,
    }
}

fn is_number(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Create `path` as an empty file unless something already exists there.
///
/// Returns `false` when the path was already taken. Never truncates or
/// replaces existing content, so it is safe to race against [`write_atomic`].
pub fn create_empty(path: &Path) -> Result<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::write(WriteStep::CreateDir, parent, e))?;
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::write(WriteStep::Create, path, e)),
    }
}

/// Read the raw content of a file.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::io(path, e))
}
