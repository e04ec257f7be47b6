//! Watch Registry for confd
//!
//! Keeps a continuously refreshed, in-memory snapshot of every registered
//! file. Each path gets its own background watch loop which survives the
//! underlying notification mechanism dying by reopening it after a retry
//! delay.
//!
//! ```text
//! [ Registry ] --owns--> [ WatchedSource ] <--publishes-- [ watch loop ]
//!                                                              |
//!                                                              v
//!                                                  [ WatchBackend (notify) ]
//! ```

pub mod backend;
pub mod change_set;
pub mod error;
pub mod registry;
pub mod retry;
mod watch_loop;

pub use backend::{ChangeKind, ChangeStream, NotifyBackend, WatchBackend};
pub use change_set::{ChangeSet, DEFAULT_FORMAT, Snapshot};
pub use error::{RegisterFailure, Result, WatchError};
pub use registry::{Registry, Subscription};
pub use retry::RetryPolicy;
