//! Lamport clock for display-name updates.
//!
//! Network delivery is unordered and may duplicate. Each info event carries
//! the sender's clock; a receiver accepts an event only if its clock is
//! strictly greater than the last one seen from that sender, so an old name
//! can never overwrite a newer one.
//!
//! On acceptance the local clock advances to `max(local, received) + 1`, the
//! standard Lamport rule, so causally related updates are ordered the same
//! way at every observer.
//!
//! The local counter is monotonic for the lifetime of the clock. Leaving a
//! channel forgets per-peer state ([`LamportClock::clear_peers`]) but never
//! winds the local counter back.
//!
//! Received values above [`MAX_INFO_CLOCK`] are refused, so no peer can push
//! the local counter to a point where it has no room left to tick.

use std::collections::HashMap;

use doorbell_proto::{MAX_INFO_CLOCK, PeerId};

/// Per-session Lamport clock with per-peer last-seen tracking.
#[derive(Debug, Clone, Default)]
pub struct LamportClock {
    local: u64,
    per_peer: HashMap<PeerId, u64>,
}

impl LamportClock {
    /// Create a clock at zero with no peer history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the local counter for an outgoing event and return it.
    ///
    /// Call exactly once per outgoing info event, before sending.
    pub fn tick(&mut self) -> u64 {
        self.local = self.local.saturating_add(1);
        self.local
    }

    /// Current local counter, without advancing it.
    pub fn observe(&self) -> u64 {
        self.local
    }

    /// Last clock value accepted from `peer` (0 if none).
    pub fn last_seen(&self, peer: &PeerId) -> u64 {
        self.per_peer.get(peer).copied().unwrap_or(0)
    }

    /// Process a received clock value.
    ///
    /// Returns `false` (and changes nothing) if `received` is not newer than
    /// the last value seen from `peer`, or exceeds [`MAX_INFO_CLOCK`].
    /// Otherwise records it, advances the local counter, and returns `true`.
    pub fn receive(&mut self, peer: &PeerId, received: u64) -> bool {
        if received <= self.last_seen(peer) || received > MAX_INFO_CLOCK {
            return false;
        }

        self.local = self.local.max(received).saturating_add(1);
        self.per_peer.insert(peer.clone(), received);
        true
    }

    /// Forget all per-peer state. The local counter is preserved.
    pub fn clear_peers(&mut self) {
        self.per_peer.clear();
    }

    /// Reset the local counter and all peer state.
    pub fn reset(&mut self) {
        self.local = 0;
        self.per_peer.clear();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    #[test]
    fn tick_is_strictly_increasing() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.observe(), 2);
    }

    #[test]
    fn receive_applies_lamport_rule() {
        let mut clock = LamportClock::new();
        clock.tick();

        assert!(clock.receive(&peer("a"), 5));
        assert_eq!(clock.observe(), 6);
        assert_eq!(clock.last_seen(&peer("a")), 5);

        // Received value below local still advances by one
        assert!(clock.receive(&peer("a"), 6));
        assert_eq!(clock.observe(), 7);
    }

    #[test]
    fn stale_and_duplicate_values_are_rejected() {
        let mut clock = LamportClock::new();
        assert!(clock.receive(&peer("a"), 3));
        let local = clock.observe();

        assert!(!clock.receive(&peer("a"), 3));
        assert!(!clock.receive(&peer("a"), 2));
        assert_eq!(clock.observe(), local);
        assert_eq!(clock.last_seen(&peer("a")), 3);
    }

    #[test]
    fn zero_is_never_accepted_from_a_fresh_peer() {
        let mut clock = LamportClock::new();
        assert!(!clock.receive(&peer("a"), 0));
        assert_eq!(clock.observe(), 0);
    }

    #[test]
    fn peers_are_tracked_independently() {
        let mut clock = LamportClock::new();
        assert!(clock.receive(&peer("A"), 5));
        assert!(clock.receive(&peer("B"), 3));
        assert!(clock.receive(&peer("B"), 4));
    }

    #[test]
    fn clear_peers_preserves_local() {
        let mut clock = LamportClock::new();
        assert!(clock.receive(&peer("a"), 10));
        assert!(!clock.receive(&peer("a"), 4));
        let local = clock.observe();

        clock.clear_peers();
        assert_eq!(clock.observe(), local);
        assert_eq!(clock.last_seen(&peer("a")), 0);
        assert!(clock.receive(&peer("a"), 4));
    }

    #[test]
    fn reset_clears_everything() {
        let mut clock = LamportClock::new();
        clock.tick();
        clock.receive(&peer("a"), 7);

        clock.reset();
        assert_eq!(clock.observe(), 0);
        assert_eq!(clock.last_seen(&peer("a")), 0);
        assert_eq!(clock.tick(), 1);
    }

    #[test]
    fn out_of_range_values_leave_room_to_tick() {
        let mut clock = LamportClock::new();
        assert!(!clock.receive(&peer("m"), u64::MAX));
        assert!(!clock.receive(&peer("m"), MAX_INFO_CLOCK + 1));
        assert_eq!(clock.observe(), 0);

        assert!(clock.receive(&peer("m"), MAX_INFO_CLOCK));
        let first = clock.tick();
        let second = clock.tick();
        assert_eq!(first, MAX_INFO_CLOCK + 2);
        assert!(second > first);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Tick,
        Receive(u8, u64),
        ClearPeers,
    }

    /// Small values plus both sides of the accepted bound and the top of
    /// the integer range.
    fn received() -> impl Strategy<Value = u64> {
        prop_oneof![
            4 => 0u64..64,
            1 => (MAX_INFO_CLOCK - 2)..=(MAX_INFO_CLOCK + 2),
            1 => (u64::MAX - 2)..=u64::MAX,
        ]
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Tick),
            (0u8..3, received()).prop_map(|(p, v)| Op::Receive(p, v)),
            Just(Op::ClearPeers),
        ]
    }

    proptest! {
        #[test]
        fn ticks_strictly_increase(ops in prop::collection::vec(op(), 0..64), ticks in 1usize..16) {
            let mut clock = LamportClock::new();
            for op in &ops {
                match op {
                    Op::Tick => { clock.tick(); },
                    Op::Receive(p, v) => { clock.receive(&PeerId::new(p.to_string()), *v); },
                    Op::ClearPeers => clock.clear_peers(),
                }
            }

            let mut previous = clock.observe();
            for _ in 0..ticks {
                let next = clock.tick();
                prop_assert!(next > previous);
                previous = next;
            }
        }

        #[test]
        fn receive_matches_reference(ops in prop::collection::vec(op(), 0..64)) {
            let mut clock = LamportClock::new();
            let mut model_local = 0u64;
            let mut model_peers: HashMap<u8, u64> = HashMap::new();

            for op in &ops {
                match op {
                    Op::Tick => {
                        model_local += 1;
                        prop_assert_eq!(clock.tick(), model_local);
                    },
                    Op::Receive(p, v) => {
                        let last = model_peers.get(p).copied().unwrap_or(0);
                        let accepted = clock.receive(&PeerId::new(p.to_string()), *v);
                        prop_assert_eq!(accepted, *v > last && *v <= MAX_INFO_CLOCK);
                        if accepted {
                            model_local = model_local.max(*v) + 1;
                            model_peers.insert(*p, *v);
                        }
                    },
                    Op::ClearPeers => {
                        clock.clear_peers();
                        model_peers.clear();
                    },
                }
                // local never decreases and always matches the model
                prop_assert_eq!(clock.observe(), model_local);
            }
        }
    }
}
