//! The file store

use std::path::{Path, PathBuf};

use confd_fs::discover::discover_files;
use confd_fs::io::{create_empty, write_atomic};
use confd_fs::{ConfigRoot, RobustnessConfig};
use confd_watch::{ChangeSet, Registry, Subscription};

use crate::{DurabilityStep, Error, Result};

/// Read, write and watch configuration files under one root directory.
///
/// Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: ConfigRoot,
    registry: Registry,
    robustness: RobustnessConfig,
}

impl FileStore {
    /// Open a store over `root`.
    ///
    /// Creates the root when missing, then registers every file found under
    /// it. Leftover temporary files from interrupted writes are ignored.
    ///
    /// # Errors
    ///
    /// Fails when the root cannot be created or walked, or when any
    /// discovered file cannot be read. In the latter case the readable files
    /// are registered regardless.
    pub async fn open(
        root: impl AsRef<Path>,
        registry: Registry,
        robustness: RobustnessConfig,
    ) -> Result<Self> {
        let root = ConfigRoot::open(root)?;
        let files = discover_files(&root)?;
        tracing::info!(root = %root.path().display(), files = files.len(), "serving configuration root");

        registry.register(&files).await?;

        Ok(Self {
            root,
            registry,
            robustness,
        })
    }

    /// Current content of a logical path.
    ///
    /// A path that is neither registered nor present on disk is created
    /// empty and served as an empty snapshot. A file that exists on disk but
    /// was never registered is registered and served as-is.
    pub async fn read(&self, logical: &str) -> Result<ChangeSet> {
        let path = self.root.resolve(logical)?;

        if let Ok(snapshot) = self.registry.get(&path) {
            return Ok(snapshot.stamped());
        }

        self.ensure_running()?;

        // Exclusive create: a concurrent write that lands first is never
        // truncated.
        let target = path.clone();
        let created = tokio::task::spawn_blocking(move || create_empty(&target))
            .await?
            .map_err(|err| Error::from_write(path.clone(), err))?;
        if created {
            tracing::debug!(path = %path.display(), "created empty configuration");
        } else {
            tracing::debug!(path = %path.display(), "registering file found on disk");
        }

        self.registry.sync(&path).await?;

        self.registry
            .get(&path)
            .map(|snapshot| snapshot.stamped())
            .map_err(|err| Error::lookup(logical, err))
    }

    /// Durably replace the content of a logical path.
    ///
    /// On return the new content is what [`read`](Self::read) serves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Durability`] naming the failed step. A failure before
    /// the rename never changes the destination. Returns [`Error::ShutDown`]
    /// after [`shutdown`](Self::shutdown).
    pub async fn write(&self, logical: &str, data: &[u8]) -> Result<()> {
        let path = self.root.resolve(logical)?;
        self.write_resolved(path, data.to_vec()).await
    }

    /// The current snapshot of a path that was read, written or discovered.
    ///
    /// Single-shot: one snapshot per call. Use [`subscribe`](Self::subscribe)
    /// to follow changes.
    pub fn watch(&self, logical: &str) -> Result<ChangeSet> {
        let path = self.root.resolve(logical)?;
        self.registry
            .get(&path)
            .map(|snapshot| snapshot.stamped())
            .map_err(|err| Error::lookup(logical, err))
    }

    /// Follow every change to a known path.
    pub fn subscribe(&self, logical: &str) -> Result<Subscription> {
        let path = self.root.resolve(logical)?;
        self.registry
            .subscribe(&path)
            .map_err(|err| Error::lookup(logical, err))
    }

    /// Logical paths of every registered file, sorted.
    pub fn list(&self) -> Vec<String> {
        self.registry
            .paths()
            .iter()
            .filter_map(|path| self.root.logical_name(path))
            .collect()
    }

    pub fn root(&self) -> &ConfigRoot {
        &self.root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve a logical path without touching the disk.
    pub fn resolve(&self, logical: &str) -> Result<PathBuf> {
        Ok(self.root.resolve(logical)?)
    }

    /// Stop watching every file.
    ///
    /// Snapshots stay readable; later writes and creations fail with
    /// [`Error::ShutDown`] without touching the disk.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    fn ensure_running(&self) -> Result<()> {
        if self.registry.is_shut_down() {
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    async fn write_resolved(&self, path: PathBuf, data: Vec<u8>) -> Result<()> {
        self.ensure_running()?;

        let robustness = self.robustness;
        let target = path.clone();
        let bytes = data.len();

        tokio::task::spawn_blocking(move || write_atomic(&target, &data, robustness))
            .await?
            .map_err(|err| Error::from_write(path.clone(), err))?;

        self.registry
            .sync(&path)
            .await
            .map_err(|err| Error::Durability {
                step: DurabilityStep::Register,
                path: path.clone(),
                source: Box::new(err),
            })?;

        tracing::debug!(path = %path.display(), bytes, "configuration written");
        Ok(())
    }
}
