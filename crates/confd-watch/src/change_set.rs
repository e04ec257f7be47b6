//! Immutable snapshots of configuration files

use std::path::Path;
use std::sync::Arc;

use confd_fs::NormalizedPath;
use confd_fs::checksum::compute_checksum;

/// Format tag used when the backing path carries no extension.
pub const DEFAULT_FORMAT: &str = "bytes";

/// A shared, immutable snapshot as held by the registry.
pub type Snapshot = Arc<ChangeSet>;

/// Snapshot of a configuration file at a point in time.
///
/// The content is never interpreted; `format` is informational and derived
/// from the file extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    /// Raw file content
    pub data: Vec<u8>,
    /// `sha256:<hex>` of `data`
    pub checksum: String,
    /// Lowercase file extension, or [`DEFAULT_FORMAT`]
    pub format: String,
    /// The backing path that produced this snapshot
    pub source: String,
    /// Unix seconds when the snapshot was produced or served
    pub timestamp: i64,
}

impl ChangeSet {
    /// Build a snapshot of `data` read from `source`.
    pub fn new(data: Vec<u8>, source: &Path) -> Self {
        Self {
            checksum: compute_checksum(&data),
            format: format_for(source),
            source: source.display().to_string(),
            timestamp: now(),
            data,
        }
    }

    /// Snapshot of a file that has no content yet.
    pub fn empty(source: &Path) -> Self {
        Self::new(Vec::new(), source)
    }

    /// Read the current content of `path` from disk.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        Ok(Self::new(data, path))
    }

    /// A copy stamped with the current time, for serving to a caller.
    pub fn stamped(&self) -> Self {
        Self {
            timestamp: now(),
            ..self.clone()
        }
    }

    /// Whether two snapshots carry the same content.
    pub fn same_content(&self, other: &ChangeSet) -> bool {
        self.checksum == other.checksum
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The format tag for a backing path.
pub fn format_for(path: &Path) -> String {
    NormalizedPath::new(path)
        .extension()
        .map(str::to_lowercase)
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
