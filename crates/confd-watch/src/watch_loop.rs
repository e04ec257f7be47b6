//! The per-path background watch loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::backend::{ChangeKind, ChangeStream, WatchBackend};
use crate::change_set::{ChangeSet, Snapshot};
use crate::registry::WatchedSource;
use crate::retry::RetryPolicy;
use crate::{Result, WatchError};

/// A request for the loop to re-read its file, acknowledged once published.
pub(crate) type ResyncRequest = oneshot::Sender<Result<()>>;

enum Exit {
    Stopped,
    StreamFailed(WatchError),
}

/// Keeps one [`WatchedSource`] in sync with disk.
///
/// The loop owns the only sender of the entry's snapshot channel, so it is
/// the single writer of `current`.
pub(crate) struct WatchLoop {
    pub(crate) entry: Arc<WatchedSource>,
    pub(crate) publisher: watch::Sender<Snapshot>,
    pub(crate) resync: mpsc::Receiver<ResyncRequest>,
    pub(crate) backend: Arc<dyn WatchBackend>,
    pub(crate) policy: RetryPolicy,
    pub(crate) stop: CancellationToken,
}

impl WatchLoop {
    pub(crate) async fn run(mut self) {
        let path = self.entry.path().to_path_buf();
        let mut retry = self.policy.backoff();

        loop {
            match self.backend.open(&path) {
                Ok(stream) => {
                    retry.reset();
                    self.entry.set_live(true);
                    tracing::debug!(path = %path.display(), "watch opened");

                    let exit = self.follow(stream).await;
                    self.entry.set_live(false);

                    match exit {
                        Exit::Stopped => break,
                        Exit::StreamFailed(err) => {
                            tracing::warn!(path = %path.display(), error = %err, "watch stream failed, reopening");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to open watch, retrying");
                }
            }

            if !self.wait(retry.next_delay()).await {
                break;
            }
        }

        tracing::debug!(path = %path.display(), "watch loop exited");
    }

    async fn follow(&mut self, mut stream: Box<dyn ChangeStream>) -> Exit {
        // Pick up anything that changed while no watch was open.
        if let Err(err) = self.refresh().await {
            tracing::debug!(error = %err, "resync after open failed");
        }

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => return Exit::Stopped,
                Some(request) = self.resync.recv() => {
                    let _ = request.send(self.refresh().await);
                }
                event = stream.next() => match event {
                    Ok(ChangeKind::Modified) => {
                        if let Err(err) = self.refresh().await {
                            tracing::debug!(error = %err, "change observed but file unreadable");
                        }
                    }
                    Ok(ChangeKind::Removed) => {
                        tracing::debug!(path = %self.entry.path().display(), "file removed, keeping last snapshot");
                    }
                    Err(err) => return Exit::StreamFailed(err),
                },
            }
        }
    }

    /// Sleep for `delay` while still answering resync requests.
    ///
    /// Returns `false` when the loop should stop.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => return false,
                _ = &mut sleep => return true,
                Some(request) = self.resync.recv() => {
                    let _ = request.send(self.refresh().await);
                }
            }
        }
    }

    async fn refresh(&self) -> Result<()> {
        let path = self.entry.path();
        let snapshot = ChangeSet::read(path)
            .await
            .map_err(|source| WatchError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        self.publish(snapshot);
        Ok(())
    }

    fn publish(&self, snapshot: ChangeSet) {
        let replaced = self.publisher.send_if_modified(|current| {
            if current.same_content(&snapshot) {
                return false;
            }
            *current = Arc::new(snapshot);
            true
        });

        if replaced {
            tracing::debug!(path = %self.entry.path().display(), "snapshot replaced");
        }
    }
}
