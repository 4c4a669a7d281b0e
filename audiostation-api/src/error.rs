//! Error types for the Audio Station API client.
//!
//! Every variant is cheap to clone: transport and I/O sources are held behind
//! an [`Arc`] so a single failed login can be handed to every caller that was
//! waiting on it.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with the Audio Station API.
#[derive(Debug, Clone, Error)]
pub enum AudioStationError {
    /// HTTP transport error (connection refused, TLS failure, reset, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    /// The server answered with a non-2xx status and no API envelope.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The API envelope reported `success: false`.
    ///
    /// The code is passed through verbatim. Common codes:
    /// - `102`: the requested API does not exist
    /// - `105`: permission denied
    /// - `106`: session timeout
    /// - `107`: session interrupted by a duplicate login
    /// - `119`: session id not found
    #[error("API error (code {code})")]
    Api {
        /// Synology API error code (not the HTTP status).
        code: i64,
    },

    /// Login was rejected, or could not be completed.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Error code from `SYNO.API.Auth`, when the server sent one.
        code: Option<i64>,
        /// Human-readable reason.
        message: String,
    },

    /// The logical API name is not allow-listed or not advertised by the server.
    #[error("API not supported: {0}")]
    UnsupportedApi(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The call did not complete within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A stream or stream open was cancelled through its token.
    #[error("stream cancelled")]
    Cancelled,

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid or unreadable client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O error (config read).
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl AudioStationError {
    /// The Synology error code carried by this error, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Api { code } => Some(*code),
            Self::Authentication { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AudioStationError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(Arc::new(e))
    }
}

impl From<std::io::Error> for AudioStationError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for AudioStationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Convenience alias for `Result<T, AudioStationError>`.
pub type Result<T> = std::result::Result<T, AudioStationError>;
