//! Error types for the JSON-RPC service

use thiserror::Error;

use crate::protocol::codes;
use confd_store::ErrorKind;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving requests
#[derive(Debug, Error)]
pub enum Error {
    /// Error from the file store
    #[error("{0}")]
    Store(#[from] confd_store::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request parameters did not match the method
    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    /// Change set data was not valid base64
    #[error("invalid data encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Loading the service configuration failed
    #[error("config error: {0}")]
    Config(#[from] confd_fs::Error),

    /// IO error on the transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `run` was called while the outbound queue is already taken
    #[error("server is already running")]
    AlreadyRunning,
}

impl Error {
    /// The JSON-RPC error code reported for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Store(err) => match err.kind() {
                ErrorKind::NotFound => codes::NOT_FOUND,
                ErrorKind::InvalidArgument => codes::INVALID_PARAMS,
                ErrorKind::Internal => codes::INTERNAL_ERROR,
            },
            Self::Json(_) => codes::PARSE_ERROR,
            Self::InvalidParams { .. } | Self::Encoding(_) => codes::INVALID_PARAMS,
            Self::Config(_) | Self::Io(_) | Self::AlreadyRunning => codes::INTERNAL_ERROR,
        }
    }
}
