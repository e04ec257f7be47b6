//! JSON-RPC server implementation
//!
//! Translates protocol messages into [`FileStore`] calls. Responses and
//! change notifications share one outbound queue so that a single writer
//! owns stdout.

use confd_store::FileStore;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::{
    ChangeSetResult, ConfigCapability, InitializeResult, JSONRPC_VERSION, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ReadParams, ServerCapabilities, ServerInfo, WatchParams,
    WireChangeSet, WriteParams, codes, methods,
};
use crate::{Error, Result};

/// Configuration service speaking JSON-RPC 2.0.
///
/// # Example
///
/// ```ignore
/// use confd_server::ConfdServer;
/// use confd_store::FileStore;
/// use confd_watch::Registry;
///
/// let store = FileStore::open("./conf", Registry::new(), Default::default()).await?;
/// ConfdServer::new(store, "config").run().await?;
/// ```
pub struct ConfdServer {
    store: FileStore,
    name: String,
    outbox: mpsc::UnboundedSender<String>,
    notifications: Option<mpsc::UnboundedReceiver<String>>,
}

impl ConfdServer {
    pub fn new(store: FileStore, name: impl Into<String>) -> Self {
        let (outbox, notifications) = mpsc::unbounded_channel();
        Self {
            store,
            name: name.into(),
            outbox,
            notifications: Some(notifications),
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the queue of serialized notifications produced by followed watches.
    ///
    /// [`run`](Self::run) drains this queue itself; it is only available once.
    pub fn take_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.notifications.take()
    }

    /// Serve requests from stdin until EOF or Ctrl-C.
    ///
    /// Every line on stdin is one request; every line on stdout is one
    /// response or notification.
    pub async fn run(&mut self) -> Result<()> {
        let Some(mut queue) = self.take_notifications() else {
            return Err(Error::AlreadyRunning);
        };

        let done = CancellationToken::new();
        let writer = tokio::spawn({
            let done = done.clone();
            async move {
                let mut stdout = tokio::io::stdout();
                loop {
                    let line = tokio::select! {
                        biased;
                        line = queue.recv() => line,
                        _ = done.cancelled() => queue.try_recv().ok(),
                    };
                    let Some(line) = line else { break };
                    stdout.write_all(line.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
                Ok::<_, std::io::Error>(())
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!(name = %self.name, root = %self.store.root().path().display(), "server ready, listening on stdio");

        let outcome = loop {
            let line = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("interrupted, shutting down");
                    break Ok(());
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(Error::from(e)),
            };
            if line.trim().is_empty() {
                continue;
            }

            tracing::debug!(request = %line, "received message");

            let response = match self.handle_message(&line).await {
                Ok(response) => response,
                Err(e) => serde_json::to_string(&JsonRpcResponse::error(
                    None,
                    e.code(),
                    e.to_string(),
                ))?,
            };
            if !response.is_empty() {
                // The receiver lives in the writer task until `done` fires.
                let _ = self.outbox.send(response);
            }
        };

        self.store.shutdown();
        done.cancel();
        match writer.await {
            Ok(result) => result?,
            Err(e) => tracing::warn!(error = %e, "stdout writer task failed"),
        }

        outcome
    }

    /// Handle a single protocol message.
    ///
    /// Returns the serialized response, or an empty string for notifications.
    ///
    /// # Errors
    ///
    /// Fails when `message` is not valid JSON. Well-formed JSON that is not a
    /// JSON-RPC 2.0 request, and every method-level failure, is reported as
    /// an error response instead.
    pub async fn handle_message(&self, message: &str) -> Result<String> {
        let value: Value = serde_json::from_str(message)?;
        let raw_id = value.get("id").filter(|id| !id.is_null()).cloned();

        let request: JsonRpcRequest = match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) if request.jsonrpc == JSONRPC_VERSION => request,
            Ok(request) => {
                return invalid_request(
                    raw_id,
                    format!("Unsupported jsonrpc version: {:?}", request.jsonrpc),
                );
            }
            Err(e) => return invalid_request(raw_id, e.to_string()),
        };
        let id = request.id;

        let outcome = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(),
            "initialized" | methods::INITIALIZED => return Ok(String::new()),
            methods::READ => self.handle_read(request.params).await,
            methods::WRITE => self.handle_write(request.params).await,
            methods::WATCH => self.handle_watch(request.params).await,
            methods::LIST => self.handle_list(),
            _ => {
                let response = JsonRpcResponse::error(
                    id,
                    codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                );
                return serde_json::to_string(&response).map_err(Error::from);
            }
        };

        let response = match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::debug!(method = %request.method, error = %e, "request failed");
                JsonRpcResponse::error(id, e.code(), e.to_string())
            }
        };

        serde_json::to_string(&response).map_err(Error::from)
    }

    fn handle_initialize(&self) -> Result<Value> {
        let result = InitializeResult {
            capabilities: ServerCapabilities {
                config: ConfigCapability {
                    read: true,
                    write: true,
                    watch: true,
                    follow: true,
                    list: true,
                },
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(serde_json::to_value(result)?)
    }

    async fn handle_read(&self, params: Value) -> Result<Value> {
        let params: ReadParams = parse_params(params)?;
        let snapshot = self.store.read(&params.path).await?;
        change_set_result(None, WireChangeSet::from(&snapshot))
    }

    async fn handle_write(&self, params: Value) -> Result<Value> {
        let params: WriteParams = parse_params(params)?;
        let data = params.change_set.decode()?;
        self.store.write(&params.path, &data).await?;
        Ok(json!({ "ok": true }))
    }

    /// Single-shot unless `follow` is set, in which case every later change
    /// is queued as a `notifications/config/changed` message.
    async fn handle_watch(&self, params: Value) -> Result<Value> {
        let params: WatchParams = parse_params(params)?;

        if !params.follow {
            let snapshot = self.store.watch(&params.path)?;
            return change_set_result(None, WireChangeSet::from(&snapshot));
        }

        let mut subscription = self.store.subscribe(&params.path)?;
        let current = match subscription.next().await {
            Some(snapshot) => snapshot.stamped(),
            None => self.store.watch(&params.path)?,
        };

        let outbox = self.outbox.clone();
        let path = params.path.clone();
        tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                let params = ChangeSetResult {
                    path: Some(path.clone()),
                    change_set: WireChangeSet::from(&snapshot.stamped()),
                };
                let Ok(params) = serde_json::to_value(params) else {
                    continue;
                };
                let note = JsonRpcNotification::new(methods::CHANGED, params);
                let Ok(line) = serde_json::to_string(&note) else {
                    continue;
                };
                if outbox.send(line).is_err() {
                    break;
                }
            }
            tracing::debug!(path = %path, "follow ended");
        });

        change_set_result(None, WireChangeSet::from(&current))
    }

    fn handle_list(&self) -> Result<Value> {
        Ok(json!({ "paths": self.store.list() }))
    }
}

fn invalid_request(id: Option<Value>, reason: String) -> Result<String> {
    let response =
        JsonRpcResponse::error(id, codes::INVALID_REQUEST, format!("Invalid request: {reason}"));
    serde_json::to_string(&response).map_err(Error::from)
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::InvalidParams {
        message: e.to_string(),
    })
}

fn change_set_result(path: Option<String>, change_set: WireChangeSet) -> Result<Value> {
    Ok(serde_json::to_value(ChangeSetResult { path, change_set })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use confd_fs::RobustnessConfig;
    use confd_watch::Registry;
    use tempfile::TempDir;

    async fn setup_server(temp: &TempDir) -> ConfdServer {
        let store = FileStore::open(temp.path(), Registry::new(), RobustnessConfig::default())
            .await
            .unwrap();
        ConfdServer::new(store, "config")
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let temp = TempDir::new().unwrap();
        let server = setup_server(&temp).await;

        let request = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let response = server.handle_message(request).await.unwrap();

        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["result"]["serverInfo"]["name"], "config");
        assert_eq!(parsed["result"]["capabilities"]["config"]["follow"], true);
    }

    #[tokio::test]
    async fn test_handle_initialized_notification() {
        let temp = TempDir::new().unwrap();
        let server = setup_server(&temp).await;

        let request = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let response = server.handle_message(request).await.unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_handle_unknown_method() {
        let temp = TempDir::new().unwrap();
        let server = setup_server(&temp).await;

        let request = r#"{"jsonrpc":"2.0","id":4,"method":"unknown/method","params":{}}"#;
        let response = server.handle_message(request).await.unwrap();
        assert!(response.contains("-32601"));
        assert!(response.contains("Method not found"));
    }

    #[tokio::test]
    async fn test_handle_invalid_json() {
        let temp = TempDir::new().unwrap();
        let server = setup_server(&temp).await;

        let result = server.handle_message(r#"{"invalid json"#).await;
        assert_eq!(result.unwrap_err().code(), codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_missing_version_is_invalid_request() {
        let temp = TempDir::new().unwrap();
        let server = setup_server(&temp).await;

        let request = r#"{"id":7,"method":"config/list"}"#;
        let parsed: Value =
            serde_json::from_str(&server.handle_message(request).await.unwrap()).unwrap();
        assert_eq!(parsed["id"], 7);
        assert_eq!(parsed["error"]["code"], codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_params_are_invalid() {
        let temp = TempDir::new().unwrap();
        let server = setup_server(&temp).await;

        let request = r#"{"jsonrpc":"2.0","id":5,"method":"config/read"}"#;
        let parsed: Value =
            serde_json::from_str(&server.handle_message(request).await.unwrap()).unwrap();
        assert_eq!(parsed["error"]["code"], codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_take_notifications_once() {
        let temp = TempDir::new().unwrap();
        let mut server = setup_server(&temp).await;

        assert!(server.take_notifications().is_some());
        assert!(server.take_notifications().is_none());
    }
}
