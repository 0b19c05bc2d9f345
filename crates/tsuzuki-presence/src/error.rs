use thiserror::Error;

/// Errors talking to the presence service.
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("presence service unavailable: {0}")]
    Connect(String),

    #[error("failed to publish activity: {0}")]
    Publish(String),

    #[error("not logged in")]
    NotConnected,

    #[error("presence actor closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
