//! Error types for confd-watch

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// A path whose initial read failed during batch registration.
#[derive(Debug)]
pub struct RegisterFailure {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl fmt::Display for RegisterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error loading {}: {}", self.path.display(), self.source)
    }
}

/// Errors that can occur in the watch registry
#[derive(Debug, Error)]
pub enum WatchError {
    /// The path was never registered
    #[error("not watching {path}")]
    NotRegistered { path: PathBuf },

    /// Reading the file content failed
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more paths of a batch registration failed
    #[error("failed to register {} path(s):\n{}", .failures.len(), join_failures(.failures))]
    Register { failures: Vec<RegisterFailure> },

    /// The notification backend could not watch the path
    #[error("cannot watch {path}: {message}")]
    Backend { path: PathBuf, message: String },

    /// The notification stream ended or reported an error
    #[error("watch stream for {path} failed: {message}")]
    Stream { path: PathBuf, message: String },

    /// The path's watch loop has exited
    #[error("watch loop for {path} is no longer running")]
    LoopExited { path: PathBuf },
}

fn join_failures(failures: &[RegisterFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl WatchError {
    /// Whether this error means "the path is unknown to the registry".
    pub fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered { .. })
    }
}
