//! Error taxonomy shared across the workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, JaideeError>;

#[derive(Debug, Error)]
pub enum JaideeError {
    /// The AI completion call failed (transport or server side).
    #[error("remote completion error: {0}")]
    Remote(String),

    /// The durable conversation store is unreachable or rejected a query.
    #[error("conversation store error: {0}")]
    Store(String),

    /// The shared key-value store failed.
    #[error("key-value store error: {0}")]
    Kv(String),

    /// Push transport rejected or failed to deliver a notification.
    #[error("push delivery error: {0}")]
    Push(String),

    /// Invalid configuration. Only raised at startup.
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
