//! Transport abstraction for topic-based peer-to-peer channels.
//!
//! The protocol runs on top of any transport that can rendezvous peers on a
//! topic and deliver named, untyped messages between them. Peer discovery,
//! NAT traversal, relays, and encryption all belong to the transport.
//!
//! Delivery is assumed to be unordered across peers and at-most-once. Within
//! one peer's stream, events are delivered in order.

use async_trait::async_trait;
use ciborium::Value;
use doorbell_proto::{ActionKind, PeerId, SessionTopic};

use crate::error::TransportError;

/// Something that happened on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Transport-level peer discovery. The peer is not verified yet.
    PeerJoined(PeerId),

    /// Peer disconnected.
    PeerLeft(PeerId),

    /// A message arrived on a registered action.
    Received {
        /// Sender
        peer: PeerId,
        /// Action the message arrived on
        action: ActionKind,
        /// Raw payload, unvalidated
        payload: Value,
    },
}

/// Opens channels for topics.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Channel handle for one topic.
    type Channel: Channel;

    /// Join `topic` and return a channel handle.
    async fn open(&self, topic: &SessionTopic) -> Result<Self::Channel, TransportError>;
}

/// One joined topic.
///
/// A channel only delivers messages for actions registered with
/// [`Channel::register_action`]; anything else is dropped by the transport.
#[async_trait]
pub trait Channel: Send + 'static {
    /// Start accepting and sending messages on `action`.
    fn register_action(&mut self, action: ActionKind);

    /// Send `payload` on `action` to `to`, or to every peer if `None`.
    fn send(
        &mut self,
        action: ActionKind,
        payload: &Value,
        to: Option<&PeerId>,
    ) -> Result<(), TransportError>;

    /// Peers the transport currently considers connected, verified or not.
    fn peers(&self) -> Vec<PeerId>;

    /// Next event if one is ready, without waiting.
    fn try_recv(&mut self) -> Option<ChannelEvent>;

    /// Wait for the next event. `None` once the channel is closed.
    async fn recv(&mut self) -> Option<ChannelEvent>;

    /// Leave the topic. Idempotent.
    fn close(&mut self);
}
