//! Filesystem change notification backends
//!
//! A backend opens a [`ChangeStream`] for one file. Dropping the stream
//! stops the underlying watch. Streams are allowed to die at any time; the
//! watch loop reopens them.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::{Result, WatchError};

/// What happened to the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created, written or renamed into place
    Modified,
    /// Deleted or renamed away
    Removed,
}

/// Opens change streams for individual files.
pub trait WatchBackend: Send + Sync + 'static {
    /// Start watching `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn ChangeStream>>;
}

/// A live stream of changes for one file.
#[async_trait]
pub trait ChangeStream: Send {
    /// Wait for the next change.
    ///
    /// An error means the stream is dead and must be reopened.
    async fn next(&mut self) -> Result<ChangeKind>;
}

/// Backend built on the platform's recommended `notify` watcher.
///
/// Watches the parent directory non-recursively and filters events down to
/// the target file name. Watching the directory keeps the watch valid when
/// an editor or [`write_atomic`](confd_fs::io::write_atomic) replaces the
/// file by renaming over it.
#[derive(Debug, Clone)]
pub struct NotifyBackend {
    channel_capacity: usize,
}

impl Default for NotifyBackend {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchBackend for NotifyBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn ChangeStream>> {
        let (dir, file_name) = match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_os_string()),
            _ => {
                return Err(WatchError::Backend {
                    path: path.to_path_buf(),
                    message: "path has no parent directory".to_string(),
                });
            }
        };

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })
        .map_err(|e| backend_error(path, e))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| backend_error(path, e))?;

        Ok(Box::new(NotifyStream {
            _watcher: watcher,
            events: rx,
            path: path.to_path_buf(),
            dir,
            file_name,
        }))
    }
}

fn backend_error(path: &Path, err: notify::Error) -> WatchError {
    WatchError::Backend {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

struct NotifyStream {
    _watcher: notify::RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<Event>>,
    path: PathBuf,
    dir: PathBuf,
    file_name: OsString,
}

impl NotifyStream {
    fn classify(&self, event: &Event) -> Result<Option<ChangeKind>> {
        // The directory itself going away invalidates the watch.
        if matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| p == &self.dir)
        {
            return Err(WatchError::Stream {
                path: self.path.clone(),
                message: format!("directory {} was removed", self.dir.display()),
            });
        }

        let touches_target = event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(self.file_name.as_os_str()));
        if !touches_target {
            return Ok(None);
        }

        let kind = match event.kind {
            EventKind::Remove(_) => Some(ChangeKind::Removed),
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
                Some(ChangeKind::Modified)
            }
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(ChangeKind::Modified),
            EventKind::Access(_) => None,
        };
        Ok(kind)
    }
}

#[async_trait]
impl ChangeStream for NotifyStream {
    async fn next(&mut self) -> Result<ChangeKind> {
        loop {
            match self.events.recv().await {
                Some(Ok(event)) => {
                    if let Some(kind) = self.classify(&event)? {
                        return Ok(kind);
                    }
                }
                Some(Err(e)) => {
                    return Err(WatchError::Stream {
                        path: self.path.clone(),
                        message: e.to_string(),
                    });
                }
                None => {
                    return Err(WatchError::Stream {
                        path: self.path.clone(),
                        message: "notification channel closed".to_string(),
                    });
                }
            }
        }
    }
}
