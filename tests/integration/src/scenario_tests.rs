//! Scenarios across the store and the registry
//!
//! Each scenario drives the store the way a client would and checks the
//! observable contract: what is served, what is on disk, and how the mirror
//! heals after the watch mechanism fails.

use std::path::Path;
use std::time::Duration;

use confd_fs::RobustnessConfig;
use confd_store::{Error, FileStore};
use confd_watch::{Registry, RetryPolicy};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

async fn open(root: &Path) -> FileStore {
    let registry = Registry::with_policy(RetryPolicy::fixed(Duration::from_millis(100)));
    FileStore::open(root, registry, RobustnessConfig::default())
        .await
        .unwrap()
}

async fn served_eventually(store: &FileStore, logical: &str, expected: &[u8]) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if store.watch(logical).map(|cs| cs.data == expected).unwrap_or(false) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Write, read back, then an out-of-band overwrite shows up within the
/// retry window.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_app_json_lifecycle() {
    let temp = TempDir::new().unwrap();
    let store = open(temp.path()).await;

    store.write("app.json", br#"{"a":1}"#).await.unwrap();
    let first = store.read("app.json").await.unwrap();
    assert_eq!(first.data, br#"{"a":1}"#.to_vec());

    std::fs::write(temp.path().join("app.json"), br#"{"a":2}"#).unwrap();
    assert!(served_eventually(&store, "app.json", br#"{"a":2}"#).await);

    let second = store.read("app.json").await.unwrap();
    assert_ne!(first.checksum, second.checksum);
}

/// Two stores over the same root see each other's writes through the
/// filesystem alone.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_two_instances_share_a_root() {
    let temp = TempDir::new().unwrap();
    let a = open(temp.path()).await;
    let b = open(temp.path()).await;

    a.write("shared.toml", b"owner = \"a\"").await.unwrap();
    assert_eq!(b.read("shared.toml").await.unwrap().data, b"owner = \"a\"".to_vec());

    a.write("shared.toml", b"owner = \"a2\"").await.unwrap();
    assert!(served_eventually(&b, "shared.toml", b"owner = \"a2\"").await);
}

/// Removing and recreating the directory of a watched file kills the
/// underlying watch; the mirror recovers once the file is back.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_directory_recreated() {
    let temp = TempDir::new().unwrap();
    let store = open(temp.path()).await;

    store.write("svc/api.json", b"v1").await.unwrap();

    std::fs::remove_dir_all(temp.path().join("svc")).unwrap();
    assert_eq!(
        store.watch("svc/api.json").unwrap().data,
        b"v1".to_vec(),
        "last snapshot is kept while the file is gone"
    );

    std::fs::create_dir_all(temp.path().join("svc")).unwrap();
    std::fs::write(temp.path().join("svc/api.json"), b"v2").unwrap();

    assert!(served_eventually(&store, "svc/api.json", b"v2").await);
}

/// A logical path that climbs above the root is clamped to it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_escape_attempt_is_confined() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    let store = open(&root).await;

    store.write("../../outside.json", b"{}").await.unwrap();

    assert!(!temp.path().join("outside.json").exists());
    assert!(root.join("outside.json").is_file());
    assert!(matches!(store.write("/", b"{}").await, Err(Error::Fs(_))));
}

/// Shutting the store down keeps serving the last snapshots.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_shutdown_keeps_last_snapshots() {
    let temp = TempDir::new().unwrap();
    let store = open(temp.path()).await;
    store.write("app.json", b"final").await.unwrap();

    store.shutdown();
    std::fs::write(temp.path().join("app.json"), b"ignored").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(store.watch("app.json").unwrap().data, b"final".to_vec());
}
