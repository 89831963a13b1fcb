//! Client error types

use shared::WireError;
use thiserror::Error;

/// Channel delivery error
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// Channel has been shut down
    #[error("channel closed")]
    Closed,

    /// Target system cannot be reached
    #[error("system unreachable: {0}")]
    Unreachable(String),
}

/// Sync engine error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// No remote system bound; nothing was dispatched
    #[error("no remote system bound")]
    Unbound,

    /// Channel refused the message
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Message could not be encoded / decoded
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Recognised operation with an unusable argument
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for sync engine operations
pub type SyncResult<T> = Result<T, SyncError>;
