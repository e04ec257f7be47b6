//! File Store for confd
//!
//! Serves configuration files that live under a single root directory.
//! Callers address files by logical path; every logical path is confined to
//! the root before it touches the disk. Content is served from the
//! [`Registry`](confd_watch::Registry) mirror and written with the atomic
//! write protocol of [`confd_fs::io`].
//!
//! # Example
//!
//! ```ignore
//! use confd_store::FileStore;
//! use confd_watch::Registry;
//!
//! let store = FileStore::open("./conf", Registry::new(), Default::default()).await?;
//! store.write("app.json", br#"{"a":1}"#).await?;
//! let snapshot = store.read("app.json").await?;
//! ```

pub mod error;
pub mod store;

pub use error::{DurabilityStep, Error, ErrorKind, Result};
pub use store::FileStore;
