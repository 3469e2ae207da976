//! Notification callbacks.

use doorbell_core::{ConnectionState, PeerCounts, SessionNotification};
use doorbell_proto::{InfoEvent, PeerId, PeerRole, RingEvent};

/// Receives session notifications from the [`crate::Runtime`].
///
/// Every callback defaults to a no-op, so implementations only override what
/// they render.
pub trait SessionObserver: Send {
    /// A validated ring arrived.
    fn on_ring(&mut self, _peer: &PeerId, _event: &RingEvent) {}

    /// The authoritative display name changed.
    fn on_info(&mut self, _peer: &PeerId, _event: &InfoEvent) {}

    /// A peer completed the presence handshake.
    fn on_peer_joined(&mut self, _peer: &PeerId, _role: PeerRole) {}

    /// A peer left the channel.
    fn on_peer_left(&mut self, _peer: &PeerId) {}

    /// Known peer counts changed.
    fn on_peer_count_changed(&mut self, _counts: PeerCounts) {}

    /// Connection state changed.
    fn on_connection_state_changed(&mut self, _state: ConnectionState) {}

    /// Route a notification to its callback.
    fn notify(&mut self, notification: &SessionNotification) {
        match notification {
            SessionNotification::Ring { peer, event } => self.on_ring(peer, event),
            SessionNotification::Info { peer, event } => self.on_info(peer, event),
            SessionNotification::PeerJoined { peer, role } => self.on_peer_joined(peer, *role),
            SessionNotification::PeerLeft { peer } => self.on_peer_left(peer),
            SessionNotification::PeerCountChanged(counts) => self.on_peer_count_changed(*counts),
            SessionNotification::ConnectionStateChanged(state) => {
                self.on_connection_state_changed(*state);
            },
        }
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
