//! The registry of watched files
//!
//! The registry owns one [`WatchedSource`] per canonical path. Structural
//! changes (insert, remove) take the map's write lock for the duration of the
//! mutation only; reads take the read lock just long enough to clone an
//! `Arc`. Snapshot replacement never touches the map lock: it goes through
//! the entry's own channel, written exclusively by the entry's watch loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::backend::{NotifyBackend, WatchBackend};
use crate::change_set::{ChangeSet, Snapshot};
use crate::retry::RetryPolicy;
use crate::watch_loop::{ResyncRequest, WatchLoop};
use crate::{RegisterFailure, Result, WatchError};

/// One registered file and its latest snapshot.
#[derive(Debug)]
pub struct WatchedSource {
    path: PathBuf,
    current: watch::Receiver<Snapshot>,
    live: AtomicBool,
    stop: CancellationToken,
    resync: mpsc::Sender<ResyncRequest>,
}

impl WatchedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The latest snapshot. Never blocks on I/O.
    pub fn current(&self) -> Snapshot {
        Arc::clone(&self.current.borrow())
    }

    /// Whether the backend watch is currently open.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Release);
    }

    async fn resync(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        let exited = || WatchError::LoopExited {
            path: self.path.clone(),
        };
        self.resync.send(ack).await.map_err(|_| exited())?;
        done.await.map_err(|_| exited())?
    }
}

/// A multi-shot subscription to one path.
///
/// Yields the snapshot current at subscription time first, then one snapshot
/// per content change. Ends when the path is unregistered or the registry
/// shuts down.
#[derive(Debug)]
pub struct Subscription {
    path: PathBuf,
    rx: watch::Receiver<Snapshot>,
    primed: bool,
}

impl Subscription {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next snapshot, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if !self.primed {
            self.primed = true;
            return Some(Arc::clone(&self.rx.borrow_and_update()));
        }
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }
}

struct Inner {
    sources: RwLock<HashMap<PathBuf, Arc<WatchedSource>>>,
    backend: Arc<dyn WatchBackend>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Mapping from canonical path to its continuously refreshed snapshot.
///
/// Cheap to clone; clones share the same entries. Dropping the last clone
/// stops every watch loop.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("paths", &self.len())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl Registry {
    /// A registry using the `notify` backend and the default retry policy.
    pub fn new() -> Self {
        Self::with_backend(NotifyBackend::new(), RetryPolicy::default())
    }

    /// A registry using the `notify` backend and a custom retry policy.
    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self::with_backend(NotifyBackend::new(), policy)
    }

    pub fn with_backend(backend: impl WatchBackend, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                sources: RwLock::new(HashMap::new()),
                backend: Arc::new(backend),
                policy,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register paths, starting one watch loop per newly seen path.
    ///
    /// Paths already registered are skipped. A failed initial read does not
    /// stop the remaining paths from registering; all failures are returned
    /// together.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Register`] listing every path whose initial
    /// read failed.
    pub async fn register<I, P>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut failures = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if self.contains(path) {
                continue;
            }

            match ChangeSet::read(path).await {
                Ok(initial) => {
                    self.insert(path.to_path_buf(), initial);
                }
                Err(source) => failures.push(RegisterFailure {
                    path: path.to_path_buf(),
                    source,
                }),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WatchError::Register { failures })
        }
    }

    /// Make sure the snapshot of `path` reflects what is on disk now.
    ///
    /// Registers the path when it is unknown, then asks the path's watch
    /// loop to re-read the file and waits until it has published. The
    /// re-read also covers a concurrent registration that won the insert
    /// with older content.
    pub async fn sync(&self, path: &Path) -> Result<()> {
        if !self.contains(path) {
            self.register([path]).await?;
        }

        let entry = self.entry(path).ok_or_else(|| WatchError::NotRegistered {
            path: path.to_path_buf(),
        })?;
        entry.resync().await
    }

    /// The latest snapshot of a registered path.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotRegistered`] for unknown paths.
    pub fn get(&self, path: &Path) -> Result<Snapshot> {
        self.entry(path)
            .map(|entry| entry.current())
            .ok_or_else(|| WatchError::NotRegistered {
                path: path.to_path_buf(),
            })
    }

    /// Subscribe to every future snapshot of a registered path.
    pub fn subscribe(&self, path: &Path) -> Result<Subscription> {
        let entry = self.entry(path).ok_or_else(|| WatchError::NotRegistered {
            path: path.to_path_buf(),
        })?;
        Ok(Subscription {
            path: entry.path.clone(),
            rx: entry.current.clone(),
            primed: false,
        })
    }

    /// Remove a path and stop its watch loop. Returns whether it was registered.
    pub fn unregister(&self, path: &Path) -> bool {
        let removed = self
            .inner
            .sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);

        match removed {
            Some(entry) => {
                entry.stop.cancel();
                tracing::debug!(path = %path.display(), "unregistered");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entry(path).is_some()
    }

    /// Whether the path's watch is currently open, `None` if unregistered.
    pub fn is_live(&self, path: &Path) -> Option<bool> {
        self.entry(path).map(|entry| entry.is_live())
    }

    /// All registered paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .inner
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.inner
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every watch loop. Snapshots stay readable.
    pub fn shutdown(&self) {
        tracing::debug!(paths = self.len(), "shutting down watch registry");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn entry(&self, path: &Path) -> Option<Arc<WatchedSource>> {
        self.inner
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Insert a new entry and spawn its loop, unless another caller won the race.
    fn insert(&self, path: PathBuf, initial: ChangeSet) -> bool {
        let (publisher, current) = watch::channel(Arc::new(initial));
        let (resync_tx, resync_rx) = mpsc::channel(8);
        let stop = self.inner.shutdown.child_token();

        let entry = Arc::new(WatchedSource {
            path: path.clone(),
            current,
            live: AtomicBool::new(false),
            stop: stop.clone(),
            resync: resync_tx,
        });

        {
            let mut sources = self
                .inner
                .sources
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if sources.contains_key(&path) {
                return false;
            }
            sources.insert(path.clone(), Arc::clone(&entry));
        }

        tracing::debug!(path = %path.display(), "registered");

        let watch_loop = WatchLoop {
            entry,
            publisher,
            resync: resync_rx,
            backend: Arc::clone(&self.inner.backend),
            policy: self.inner.policy,
            stop,
        };
        tokio::spawn(watch_loop.run());
        true
    }
}
