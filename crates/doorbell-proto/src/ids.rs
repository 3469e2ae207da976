//! Opaque identifiers handed to us by the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a remote peer on a channel.
///
/// Unique for the lifetime of a channel. Not stable across reconnects, so it
/// must never be used as a long-lived key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a transport-assigned peer identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Rendezvous identifier peers use to find each other.
///
/// Derived from a secret token outside this crate; treated as opaque here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionTopic(String);

impl SessionTopic {
    /// Wrap a topic string.
    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// Borrow the raw topic string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionTopic {
    fn from(topic: &str) -> Self {
        Self::new(topic)
    }
}
