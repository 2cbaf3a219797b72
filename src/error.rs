//! Error types for the hub and its transports.

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur while publishing or pumping a subscriber connection
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("refusing to broadcast an empty message")]
    EmptyMessage,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("broadcast pass aborted: {0}")]
    Dispatch(String),
}

impl From<axum::Error> for HubError {
    fn from(err: axum::Error) -> Self {
        HubError::Transport(err.to_string())
    }
}
