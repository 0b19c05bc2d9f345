use std::time::Duration;

use thiserror::Error;

/// Failures of a single IPC request/reply exchange with mpv.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("connection closed by player")]
    Closed,

    #[error("property unavailable: {0}")]
    Property(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
}

impl IpcError {
    /// Whether the connection is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IpcError::Property(_))
    }
}

/// Failures controlling the mpv process itself.
#[derive(Debug, Error)]
pub enum MpvError {
    #[error("failed to launch {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
