//! confd configuration server
//!
//! Serves every file under a configs root over JSON-RPC 2.0 and keeps them
//! mirrored in memory as they change on disk.
//!
//! # Usage
//!
//! ```bash
//! confd [--root <path>] [--config <file>] [--name <name>]
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIGS_PATH`: configs root (default: `./conf`)
//! - `RUST_LOG`: log verbosity (default: `confd=info`)
//!
//! # Protocol
//!
//! Requests and responses go through stdin/stdout, one JSON message per
//! line. Logs go to stderr.

use std::path::PathBuf;

use clap::Parser;
use confd_server::{ConfdServer, ServiceConfig, logging};
use confd_store::FileStore;
use confd_watch::Registry;

/// File-backed configuration server
#[derive(Parser)]
#[command(name = "confd")]
#[command(about = "File-backed configuration server")]
#[command(version)]
struct Args {
    /// Root directory of the served configuration files
    #[arg(short, long, env = "CONFIGS_PATH")]
    root: Option<PathBuf>,

    /// Service configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server name reported to clients
    #[arg(long)]
    name: Option<String>,

    /// Skip fsync of temporary files before rename
    #[arg(long)]
    no_fsync: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init().map_err(|e| e as Box<dyn std::error::Error>)?;

    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(root) = args.root {
        config.configs.path = root;
    }
    if let Some(name) = args.name {
        config.server.name = name;
    }
    if args.no_fsync {
        config.durability.fsync = false;
    }

    tracing::info!(root = ?config.configs.path, name = %config.server.name, "starting confd");

    let registry = Registry::with_policy(config.watch.policy());
    let store = FileStore::open(
        &config.configs.path,
        registry,
        config.durability.robustness(),
    )
    .await?;

    let mut server = ConfdServer::new(store, config.server.name);
    server.run().await?;

    Ok(())
}
