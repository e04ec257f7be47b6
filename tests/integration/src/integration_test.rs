//! End-to-end integration test for the full stack
//!
//! This test exercises the complete flow: service config -> file store ->
//! registry -> JSON-RPC server.

use std::time::Duration;

use confd_server::{ConfdServer, ServiceConfig};
use confd_store::FileStore;
use confd_watch::Registry;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Set up a configs root with a few files and a service config pointing at it
fn setup_service() -> (TempDir, ServiceConfig) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("conf");
    std::fs::create_dir_all(root.join("services")).unwrap();
    std::fs::write(root.join("app.json"), r#"{"debug":false}"#).unwrap();
    std::fs::write(root.join("services/db.yaml"), "pool: 8\n").unwrap();

    let config_path = temp.path().join("confd.json");
    std::fs::write(
        &config_path,
        json!({
            "configs": {"path": root},
            "watch": {"retry_initial_ms": 50, "retry_max_ms": 200, "retry_multiplier": 2.0},
            "durability": {"fsync": false}
        })
        .to_string(),
    )
    .unwrap();

    let config = ServiceConfig::load(Some(&config_path)).unwrap();
    (temp, config)
}

async fn start(config: &ServiceConfig) -> ConfdServer {
    let registry = Registry::with_policy(config.watch.policy());
    let store = FileStore::open(
        &config.configs.path,
        registry,
        config.durability.robustness(),
    )
    .await
    .unwrap();
    ConfdServer::new(store, config.server.name.clone())
}

async fn call(server: &ConfdServer, id: u64, method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
    serde_json::from_str(&server.handle_message(&request.to_string()).await.unwrap()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_serves_existing_root() {
    let (_temp, config) = setup_service();
    assert_eq!(config.server.name, "config");
    assert!(!config.durability.fsync);

    let server = start(&config).await;

    let listed = call(&server, 1, "config/list", Value::Null).await;
    assert_eq!(listed["result"]["paths"], json!(["app.json", "services/db.yaml"]));

    let read = call(&server, 2, "config/read", json!({"path": "services/db.yaml"})).await;
    assert_eq!(read["result"]["changeSet"]["format"], "yaml");
    // "pool: 8\n"
    assert_eq!(read["result"]["changeSet"]["data"], "cG9vbDogOAo=");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_survives_restart() {
    let (_temp, config) = setup_service();

    {
        let server = start(&config).await;
        let written = call(
            &server,
            1,
            "config/write",
            json!({"path": "app.json", "changeSet": {"data": "eyJkZWJ1ZyI6dHJ1ZX0="}}),
        )
        .await;
        assert_eq!(written["result"]["ok"], true);
        server.store().shutdown();
    }

    let server = start(&config).await;
    let read = call(&server, 2, "config/read", json!({"path": "app.json"})).await;
    // {"debug":true}
    assert_eq!(read["result"]["changeSet"]["data"], "eyJkZWJ1ZyI6dHJ1ZX0=");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_external_edit_reaches_clients() {
    let (_temp, config) = setup_service();
    let server = start(&config).await;

    std::fs::write(config.configs.path.join("app.json"), r#"{"debug":true}"#).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let watched = call(&server, 1, "config/watch", json!({"path": "app.json"})).await;
        if watched["result"]["changeSet"]["data"] == "eyJkZWJ1ZyI6dHJ1ZX0=" {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "external edit was never observed"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
