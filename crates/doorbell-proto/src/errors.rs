//! Error types for payload encoding and validation.

use thiserror::Error;

use crate::message::ActionKind;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Failures turning payloads into bytes and back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Payload could not be serialized to CBOR.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// Bytes were not valid CBOR.
    #[error("failed to decode payload: {0}")]
    Decode(String),

    /// Payload exceeds the size limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual payload size in bytes
        size: usize,
        /// Maximum accepted size in bytes
        max: usize,
    },
}

/// Why an inbound payload was refused by a validator.
///
/// Rejections are expected in normal operation (malformed or adversarial
/// peers) and are logged and dropped by the caller, never propagated as
/// fatal errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Payload is not a CBOR map.
    #[error("payload is not a map")]
    NotAMap,

    /// The `kind` discriminator does not match the action it arrived on.
    #[error("expected kind {expected}, found {found:?}")]
    WrongKind {
        /// Kind the validator was asked to accept
        expected: ActionKind,
        /// What the payload claimed (empty if absent or not text)
        found: String,
    },

    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has the wrong type or an out-of-range value.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Short description of the problem
        reason: &'static str,
    },

    /// Ring timestamp is too far from local time.
    #[error("timestamp drift {drift_ms}ms exceeds {max_drift_ms}ms")]
    TimestampDrift {
        /// Absolute distance between the claimed timestamp and local time
        drift_ms: u64,
        /// Configured bound
        max_drift_ms: u64,
    },
}
