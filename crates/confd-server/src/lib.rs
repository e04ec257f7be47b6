//! JSON-RPC service for confd
//!
//! Exposes a [`FileStore`](confd_store::FileStore) to remote callers as
//! newline-delimited JSON-RPC 2.0 over stdio.
//!
//! # Architecture
//!
//! ```text
//! [ client ]
//!      | (JSON-RPC over stdio)
//!      v
//! [ confd-server ] --> [ confd-store ] --> [ confd-watch ] --> [ notify ]
//!                            |
//!                            +--> [ configs root (filesystem) ]
//! ```
//!
//! # Methods
//!
//! - `initialize` - server info and capabilities
//! - `config/read` - content of a file, created empty when missing
//! - `config/write` - durably replace a file
//! - `config/watch` - current content, optionally followed by
//!   `notifications/config/changed` for every later change
//! - `config/list` - every served file

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;

pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use server::ConfdServer;
