//! Filesystem primitives for confd
//!
//! Provides root-confined path resolution, content checksums, the atomic
//! write protocol and format-agnostic loading of the service's own config.

pub mod checksum;
pub mod config;
pub mod discover;
pub mod error;
pub mod io;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::{RobustnessConfig, WriteStep};
pub use path::{ConfigRoot, NormalizedPath};
