//! Wire vocabulary for the doorbell session protocol.
//!
//! Peers exchange three kinds of events over named transport actions:
//! `presence` (role announcement), `info` (the doorbell owner's display name,
//! ordered by a Lamport clock) and `ring`. On the wire every event is an
//! untyped CBOR map with a `kind` discriminator, because the transport hands
//! us whatever the remote peer chose to send.
//!
//! Outbound events are built from typed values ([`Message::to_value`]).
//! Inbound payloads only become typed values after passing the validators in
//! [`validate`], which report a typed [`Rejection`] instead of failing.
//!
//! # Security
//!
//! Validation is the protocol boundary. Payloads larger than
//! [`codec::MAX_PAYLOAD_SIZE`] are refused before decoding, and ring
//! timestamps outside the drift bound are rejected to limit replay.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
pub mod ids;
pub mod message;
pub mod validate;

pub use errors::{ProtocolError, Rejection, Result};
pub use ids::{PeerId, SessionTopic};
pub use message::{ActionKind, InfoEvent, Message, PeerRole, PresenceEvent, RingEvent};
pub use validate::{DEFAULT_MAX_DRIFT_MS, MAX_INFO_CLOCK, validate_info, validate_presence, validate_ring};
