//! Error types for the shared crate

use thiserror::Error;

/// Errors raised while decoding wire data
#[derive(Debug, Error)]
pub enum WireError {
    /// Digest field does not hold exactly 16 bytes
    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    /// Envelope carries another kind of traffic
    #[error("unexpected event type: expected {expected}, got {actual}")]
    UnexpectedEventType {
        expected: crate::EventType,
        actual: crate::EventType,
    },

    /// Payload serialization error
    #[error("payload serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for wire decoding
pub type WireResult<T> = Result<T, WireError>;
