//! Wire protocol message types
//!
//! JSON-RPC 2.0 message structures and the method parameter/result shapes
//! of the configuration service.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use confd_watch::ChangeSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes used by the service.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server-defined: the requested configuration is unknown.
    pub const NOT_FOUND: i32 = -32004;
}

/// Method names.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const READ: &str = "config/read";
    pub const WRITE: &str = "config/write";
    pub const WATCH: &str = "config/watch";
    pub const LIST: &str = "config/list";
    pub const CHANGED: &str = "notifications/config/changed";
}

/// The only protocol version accepted.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 Request
///
/// `jsonrpc` defaults to empty so that a missing version surfaces as an
/// invalid request rather than a parse error.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 2.0 Notification (no id, no response expected)
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// Initialize response result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub config: ConfigCapability,
}

#[derive(Debug, Serialize)]
pub struct ConfigCapability {
    pub read: bool,
    pub write: bool,
    pub watch: bool,
    pub follow: bool,
    pub list: bool,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// A change set as carried on the wire.
///
/// `data` is standard base64. Only `data` is required when writing; the
/// remaining fields are filled in by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChangeSet {
    pub data: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl WireChangeSet {
    /// Decode the raw content.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

impl From<&ChangeSet> for WireChangeSet {
    fn from(cs: &ChangeSet) -> Self {
        Self {
            data: STANDARD.encode(&cs.data),
            checksum: cs.checksum.clone(),
            format: cs.format.clone(),
            source: cs.source.clone(),
            timestamp: cs.timestamp,
        }
    }
}

/// `config/read` params
#[derive(Debug, Deserialize)]
pub struct ReadParams {
    pub path: String,
}

/// `config/write` params
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteParams {
    pub path: String,
    pub change_set: WireChangeSet,
}

/// `config/watch` params
#[derive(Debug, Deserialize)]
pub struct WatchParams {
    pub path: String,
    /// Keep pushing every later change as a notification.
    #[serde(default)]
    pub follow: bool,
}

/// Result of `config/read` and `config/watch`, and params of
/// `notifications/config/changed`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub change_set: WireChangeSet,
}
