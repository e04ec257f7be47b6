//! Normalized path handling and root confinement

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A path normalized to use forward slashes internally.
///
/// Normalization converts backslashes to forward slashes, drops empty and
/// `.` segments and resolves `..` lexically. A `..` can never climb above
/// the start of the path: for absolute paths it stops at `/`, for relative
/// paths a leading `..` is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self { inner: clean(&raw) }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment, resolving dot segments in the result.
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            return Self::new(segment);
        }
        Self::new(format!("{}/{}", self.inner, segment))
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        match self.inner.rfind('/') {
            Some(0) if self.inner.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) if idx > 0 => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 || idx + 1 == name.len() {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }

    /// Whether the path starts at the filesystem root.
    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/')
    }

    /// Whether nothing is left after normalization (or only `/`).
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty() || self.inner == "/"
    }

    /// Iterate over the non-empty segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }
}

fn clean(raw: &str) -> String {
    let absolute = raw.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

/// The directory every served configuration file lives under.
///
/// Logical paths supplied by callers are resolved as if they were rooted at
/// this directory, so no combination of `..`, `.` or leading slashes can
/// produce a path outside of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRoot {
    root: PathBuf,
}

impl ConfigRoot {
    /// Open a root directory, creating it when missing.
    ///
    /// The stored path is canonical so that resolved paths compare equal to
    /// the paths produced by walking the directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
        let root = dunce::canonicalize(path).map_err(|e| Error::io(path, e))?;
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied logical path to a canonical path under the root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] when the logical path normalizes to the
    /// root itself or carries a platform path prefix.
    pub fn resolve(&self, logical: &str) -> Result<PathBuf> {
        let normalized = NormalizedPath::new(logical);
        if normalized.is_empty() {
            return Err(Error::invalid_path(logical, "path resolves to the root directory"));
        }

        let mut resolved = self.root.clone();
        for segment in normalized.segments() {
            if cfg!(windows) && segment.contains(':') {
                return Err(Error::invalid_path(logical, "drive prefixes are not allowed"));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    /// Whether `path` lies under the root.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && path != self.root
    }

    /// The logical (root-relative, `/`-separated) name of a path under the root.
    pub fn logical_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if name.is_empty() { None } else { Some(name) }
    }
}
