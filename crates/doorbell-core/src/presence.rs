//! Peer presence handshake.
//!
//! The transport tells each side about a new peer independently and with no
//! ordering between the two notifications. Either side may attach its
//! listeners after the other has already announced itself. The handshake
//! below converges regardless of order:
//!
//! ```text
//!            raw join                      first valid Presence
//! ┌─────────┐ ──────────> announce  ┌─────────┐ ───────────────> ┌────────────┐
//! │ Unknown │                       │ Unknown │   record role,    │ Known(role)│
//! └─────────┘                       └─────────┘   reply once      └────────────┘
//!                                                                      │ Presence again:
//!                                                                      │ update role silently
//! ```
//!
//! - On the raw transport join we always announce our role to the new peer.
//!   If they joined first and announced before we were listening, this is
//!   the only way they learn about us.
//! - On the first valid presence from a peer we record its role and reply
//!   with our own announcement. This closes the handshake when the peer was
//!   connected before our join listener attached.
//! - Only that first valid presence makes the peer Known. Raw joins never
//!   count, so peer and role counts never include unverified peers.
//! - Leave removes the peer whether or not the handshake completed.

use std::collections::HashMap;

use doorbell_proto::{PeerId, PeerRole, PresenceEvent};

/// Effects requested by the presence tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceAction {
    /// Send our presence announcement to this peer
    Announce {
        /// Recipient
        to: PeerId,
        /// Our announcement
        event: PresenceEvent,
    },

    /// Peer completed the handshake for the first time
    PeerKnown {
        /// Newly known peer
        peer: PeerId,
        /// Its declared role
        role: PeerRole,
    },

    /// Peer left the channel
    PeerGone {
        /// Departed peer
        peer: PeerId,
        /// Its role, if the handshake had completed
        role: Option<PeerRole>,
    },
}

/// Role table for one channel.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    local_role: PeerRole,
    peers: HashMap<PeerId, PeerRole>,
}

impl PresenceTracker {
    /// Create a tracker announcing `local_role`.
    pub fn new(local_role: PeerRole) -> Self {
        Self { local_role, peers: HashMap::new() }
    }

    /// Our own announcement.
    pub fn announcement(&self) -> PresenceEvent {
        PresenceEvent { role: self.local_role }
    }

    /// Transport reported a new peer. Announce unconditionally.
    pub fn on_raw_join(&mut self, peer: PeerId) -> Vec<PresenceAction> {
        vec![PresenceAction::Announce { to: peer, event: self.announcement() }]
    }

    /// A validated presence announcement arrived from `peer`.
    pub fn on_presence(&mut self, peer: PeerId, event: PresenceEvent) -> Vec<PresenceAction> {
        match self.peers.insert(peer.clone(), event.role) {
            None => vec![
                PresenceAction::Announce { to: peer.clone(), event: self.announcement() },
                PresenceAction::PeerKnown { peer, role: event.role },
            ],
            // Already known: role reassignment is silent
            Some(_) => Vec::new(),
        }
    }

    /// Transport reported that `peer` left.
    pub fn on_leave(&mut self, peer: PeerId) -> Vec<PresenceAction> {
        let role = self.peers.remove(&peer);
        vec![PresenceAction::PeerGone { peer, role }]
    }

    /// Declared role of a known peer.
    pub fn role_of(&self, peer: &PeerId) -> Option<PeerRole> {
        self.peers.get(peer).copied()
    }

    /// Whether `peer` has completed the handshake.
    pub fn is_known(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    /// Number of known peers.
    pub fn known_count(&self) -> usize {
        self.peers.len()
    }

    /// Number of known peers that declared `role`.
    pub fn count_role(&self, role: PeerRole) -> usize {
        self.peers.values().filter(|r| **r == role).count()
    }

    /// Forget every peer.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ringer() -> PresenceEvent {
        PresenceEvent { role: PeerRole::Ringer }
    }

    #[test]
    fn raw_join_announces_without_knowing() {
        let mut tracker = PresenceTracker::new(PeerRole::Doorbell);
        let actions = tracker.on_raw_join(PeerId::new("p"));

        assert_eq!(
            actions,
            vec![PresenceAction::Announce {
                to: PeerId::new("p"),
                event: PresenceEvent { role: PeerRole::Doorbell },
            }]
        );
        assert!(!tracker.is_known(&PeerId::new("p")));
        assert_eq!(tracker.known_count(), 0);
    }

    #[test]
    fn first_presence_replies_and_reports_known() {
        let mut tracker = PresenceTracker::new(PeerRole::Doorbell);
        let actions = tracker.on_presence(PeerId::new("p"), ringer());

        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], PresenceAction::Announce { to, .. } if to.as_str() == "p"));
        assert_eq!(
            actions[1],
            PresenceAction::PeerKnown { peer: PeerId::new("p"), role: PeerRole::Ringer }
        );
        assert_eq!(tracker.role_of(&PeerId::new("p")), Some(PeerRole::Ringer));
    }

    #[test]
    fn repeated_presence_is_idempotent_but_updates_role() {
        let mut tracker = PresenceTracker::new(PeerRole::Ringer);
        tracker.on_presence(PeerId::new("p"), ringer());

        let actions = tracker.on_presence(PeerId::new("p"), PresenceEvent { role: PeerRole::Doorbell });
        assert!(actions.is_empty());
        assert_eq!(tracker.role_of(&PeerId::new("p")), Some(PeerRole::Doorbell));
        assert_eq!(tracker.count_role(PeerRole::Doorbell), 1);
        assert_eq!(tracker.count_role(PeerRole::Ringer), 0);
    }

    #[test]
    fn leave_reports_unverified_peers_too() {
        let mut tracker = PresenceTracker::new(PeerRole::Ringer);
        tracker.on_raw_join(PeerId::new("u"));
        tracker.on_presence(PeerId::new("k"), ringer());

        assert_eq!(
            tracker.on_leave(PeerId::new("u")),
            vec![PresenceAction::PeerGone { peer: PeerId::new("u"), role: None }]
        );
        assert_eq!(
            tracker.on_leave(PeerId::new("k")),
            vec![PresenceAction::PeerGone { peer: PeerId::new("k"), role: Some(PeerRole::Ringer) }]
        );
        assert_eq!(tracker.known_count(), 0);
    }

    #[test]
    fn rejoin_after_leave_is_new_again() {
        let mut tracker = PresenceTracker::new(PeerRole::Ringer);
        tracker.on_presence(PeerId::new("p"), ringer());
        tracker.on_leave(PeerId::new("p"));

        let actions = tracker.on_presence(PeerId::new("p"), ringer());
        assert!(actions.iter().any(|a| matches!(a, PresenceAction::PeerKnown { .. })));
    }
}
