//! Doorbell session core logic
//!
//! Pure state machine logic for the doorbell session protocol, completely
//! decoupled from I/O. A doorbell and any number of ringers meet on a topic
//! of an unordered, at-most-once peer transport; this crate keeps their view
//! of the session consistent.
//!
//! # Architecture
//!
//! Protocol logic is implemented as deterministic state machines isolated
//! from networking and scheduling. Time and randomness come from an
//! [`Environment`] supplied by the caller.
//!
//! State transitions produce declarative [`SessionAction`]s (open a channel,
//! send a message, notify the UI, record history) rather than executing
//! effects directly. A runtime or test harness interprets them.
//!
//! # Components
//!
//! - [`clock`]: Lamport clock ordering display-name updates
//! - [`presence`]: role handshake run against peer join/leave events
//! - [`session`]: connection lifecycle, peer counts, send operations
//! - [`history`]: doorbell/ringer history records and in-memory store
//! - [`topic`]: secret token generation and topic derivation
//! - [`mod@env`]: Environment abstraction (time, RNG)
//! - [`transport`]: Transport abstraction (topic channels, named actions)
//! - [`error`]: Error types

pub mod clock;
pub mod env;
pub mod error;
pub mod history;
pub mod nonce;
pub mod presence;
pub mod session;
pub mod topic;
pub mod transport;

pub use clock::LamportClock;
pub use env::Environment;
pub use error::{HistoryError, SessionError, TransportError};
pub use history::{HistoryRecord, HistoryStore, MemoryHistory};
pub use presence::{PresenceAction, PresenceTracker};
pub use session::{
    ConnectionState, DEFAULT_JOIN_TIMEOUT, DEFAULT_READY_POLICY, JoinOptions, PeerCounts, ReadyPolicy, Session,
    SessionAction, SessionConfig, SessionNotification,
};
pub use transport::{Channel, ChannelEvent, Transport};
