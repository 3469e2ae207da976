//! Error types for the session core.

use thiserror::Error;

/// Errors returned by session send operations.
///
/// Malformed, stale, or drifted inbound messages are not errors: they are
/// logged and dropped inside the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No channel is open, so there is nobody to send to.
    #[error("no active channel")]
    NoActiveChannel,
}

/// Errors reported by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport could not open or use a channel.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The channel was already closed.
    #[error("channel closed")]
    Closed,
}

/// Errors persisting or restoring history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// History could not be serialized.
    #[error("failed to encode history: {0}")]
    Encode(String),

    /// Stored bytes are not a valid history.
    #[error("failed to decode history: {0}")]
    Decode(String),
}
