//! Typed protocol events and their untyped wire form.
//!
//! Each event travels on its own named transport action. The wire form is a
//! CBOR map carrying a `kind` discriminator plus the event fields:
//!
//! ```text
//! presence: { kind: "presence", role: "doorbell" | "ringer" }
//! info:     { kind: "info", name: <text>, clock: <uint> }
//! ring:     { kind: "ring", timestamp: <epoch ms>, nonce: <text> }
//! ```

use std::fmt;

use ciborium::Value;
use serde::{Deserialize, Serialize};

/// Role a peer declares for the life of its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Receives rings; owns the display name.
    Doorbell,
    /// Sends rings.
    Ringer,
}

impl PeerRole {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doorbell => "doorbell",
            Self::Ringer => "ringer",
        }
    }

    /// Parse a wire role name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "doorbell" => Some(Self::Doorbell),
            "ringer" => Some(Self::Ringer),
            _ => None,
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named transport action an event travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    /// Role handshake
    Presence,
    /// Display name update
    Info,
    /// Doorbell ring
    Ring,
}

impl ActionKind {
    /// All actions a channel registers.
    pub const ALL: [Self; 3] = [Self::Presence, Self::Info, Self::Ring];

    /// Action name, also used as the `kind` discriminator.
    pub fn name(self) -> &'static str {
        match self {
            Self::Presence => "presence",
            Self::Info => "info",
            Self::Ring => "ring",
        }
    }

    /// Look up an action by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A ring. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingEvent {
    /// Sender wall-clock time, epoch milliseconds
    pub timestamp: u64,
    /// Random per-ring value
    pub nonce: String,
}

/// Current display name of the doorbell owner, ordered by Lamport clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoEvent {
    /// Display name
    pub name: String,
    /// Sender's Lamport clock at send time
    pub clock: u64,
}

/// Role announcement exchanged during the presence handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// Declared role of the sender
    pub role: PeerRole,
}

/// Any outbound protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Role announcement
    Presence(PresenceEvent),
    /// Name update
    Info(InfoEvent),
    /// Ring
    Ring(RingEvent),
}

impl Message {
    /// Transport action this message is sent on.
    pub fn action(&self) -> ActionKind {
        match self {
            Self::Presence(_) => ActionKind::Presence,
            Self::Info(_) => ActionKind::Info,
            Self::Ring(_) => ActionKind::Ring,
        }
    }

    /// Build the untyped wire form.
    pub fn to_value(&self) -> Value {
        let mut entries = vec![entry("kind", Value::Text(self.action().name().to_string()))];
        match self {
            Self::Presence(presence) => {
                entries.push(entry("role", Value::Text(presence.role.as_str().to_string())));
            },
            Self::Info(info) => {
                entries.push(entry("name", Value::Text(info.name.clone())));
                entries.push(entry("clock", Value::Integer(info.clock.into())));
            },
            Self::Ring(ring) => {
                entries.push(entry("timestamp", Value::Integer(ring.timestamp.into())));
                entries.push(entry("nonce", Value::Text(ring.nonce.clone())));
            },
        }
        Value::Map(entries)
    }
}

impl From<PresenceEvent> for Message {
    fn from(event: PresenceEvent) -> Self {
        Self::Presence(event)
    }
}

impl From<InfoEvent> for Message {
    fn from(event: InfoEvent) -> Self {
        Self::Info(event)
    }
}

impl From<RingEvent> for Message {
    fn from(event: RingEvent) -> Self {
        Self::Ring(event)
    }
}

fn entry(key: &str, value: Value) -> (Value, Value) {
    (Value::Text(key.to_string()), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ActionKind::from_name("goodbye"), None);
    }

    #[test]
    fn presence_wire_form_carries_kind_and_role() {
        let value = Message::from(PresenceEvent { role: PeerRole::Ringer }).to_value();
        let Value::Map(entries) = value else {
            unreachable!("presence encodes as a map");
        };

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (Value::Text("kind".into()), Value::Text("presence".into())));
        assert_eq!(entries[1], (Value::Text("role".into()), Value::Text("ringer".into())));
    }

    #[test]
    fn role_parsing_is_case_sensitive() {
        assert_eq!(PeerRole::from_wire("doorbell"), Some(PeerRole::Doorbell));
        assert_eq!(PeerRole::from_wire("Doorbell"), None);
    }
}
