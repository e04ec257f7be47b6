//! Error types for confd-store

use std::fmt;
use std::path::PathBuf;

use confd_fs::WriteStep;
use confd_watch::WatchError;

/// Result type for confd-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// The step of a write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityStep {
    /// One of the filesystem steps of the atomic write
    Write(WriteStep),
    /// Publishing the written file to the registry
    Register,
}

impl From<WriteStep> for DurabilityStep {
    fn from(step: WriteStep) -> Self {
        Self::Write(step)
    }
}

impl fmt::Display for DurabilityStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write(step) => fmt::Display::fmt(step, f),
            Self::Register => f.write_str("register"),
        }
    }
}

/// Broad classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Internal,
}

/// Errors that can occur in File Store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing is known about the path
    #[error("Configuration not found: {path}")]
    NotFound { path: String },

    /// A step of the write protocol failed
    #[error("{step} failed for {path}: {source}")]
    Durability {
        step: DurabilityStep,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store was shut down; nothing is written any more
    #[error("Store is shut down")]
    ShutDown,

    /// A blocking filesystem task was cancelled or panicked
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Filesystem error from confd-fs
    #[error(transparent)]
    Fs(#[from] confd_fs::Error),

    /// Registry error from confd-watch
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Durability { .. } => ErrorKind::InvalidArgument,
            Self::Fs(confd_fs::Error::InvalidPath { .. }) => ErrorKind::InvalidArgument,
            Self::Watch(err) if err.is_not_registered() => ErrorKind::NotFound,
            Self::ShutDown | Self::Task(_) | Self::Fs(_) | Self::Watch(_) => ErrorKind::Internal,
        }
    }

    /// Convert a failed atomic write into a durability error.
    pub(crate) fn from_write(path: PathBuf, err: confd_fs::Error) -> Self {
        match err {
            confd_fs::Error::Write { step, path, source } => Self::Durability {
                step: step.into(),
                path,
                source: Box::new(source),
            },
            confd_fs::Error::Io { source, .. } => Self::Durability {
                step: WriteStep::WriteTemp.into(),
                path,
                source: Box::new(source),
            },
            other => Self::Fs(other),
        }
    }

    /// Map a registry lookup failure for `logical` onto the store's taxonomy.
    pub(crate) fn lookup(logical: &str, err: WatchError) -> Self {
        if err.is_not_registered() {
            Self::NotFound {
                path: logical.to_string(),
            }
        } else {
            Self::Watch(err)
        }
    }
}
