//! In-memory topic-based peer network.
//!
//! [`SimNetwork`] stands in for a rendezvous-based P2P transport. Peers that
//! open the same topic see each other's join and leave events and exchange
//! payloads on named actions. Payloads cross the network as CBOR bytes, so
//! receivers see exactly what a real wire would give them.
//!
//! Delivery is reliable and in order per sender. The faults that matter to
//! the session protocol are modelled explicitly:
//!
//! - *Late listeners*: [`SimNetwork::suppress_join_events`] makes a peer miss
//!   every raw join notification, as if its join listener attached after the
//!   other side had already arrived.
//! - *Unregistered actions*: a payload on an action the recipient has not
//!   registered is dropped.
//! - *Join failures*: [`SimNetwork::set_unreachable`] makes `open` fail.
//! - *Replays and garbage*: [`SimNetwork::inject`] delivers an arbitrary
//!   payload as if a given peer had sent it.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use ciborium::Value;
use doorbell_core::{Channel, ChannelEvent, Transport, TransportError};
use doorbell_proto::{
    ActionKind, PeerId, SessionTopic,
    codec::{decode_value, encode_value},
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, trace};

struct Member {
    events: UnboundedSender<ChannelEvent>,
    registered: HashSet<ActionKind>,
}

#[derive(Default)]
struct NetworkState {
    topics: HashMap<SessionTopic, BTreeMap<PeerId, Member>>,
    deaf_to_joins: HashSet<PeerId>,
    unreachable: HashSet<PeerId>,
    delivered: usize,
    dropped: usize,
}

impl NetworkState {
    fn notify(&mut self, topic: &SessionTopic, to: &PeerId, event: ChannelEvent) {
        if let Some(member) = self.topics.get(topic).and_then(|m| m.get(to)) {
            // A closed receiver means the channel is going away; nothing to do
            let _ = member.events.send(event);
        }
    }

    fn deliver(
        &mut self,
        topic: &SessionTopic,
        from: &PeerId,
        action: ActionKind,
        bytes: &[u8],
        to: Option<&PeerId>,
    ) {
        let Some(members) = self.topics.get(topic) else {
            return;
        };

        let mut delivered = 0;
        let mut dropped = 0;
        for (peer, member) in members {
            if peer == from || to.is_some_and(|to| to != peer) {
                continue;
            }
            if !member.registered.contains(&action) {
                trace!(%peer, %action, "recipient has not registered action, dropping");
                dropped += 1;
                continue;
            }
            match decode_value(bytes) {
                Ok(payload) => {
                    let event = ChannelEvent::Received { peer: from.clone(), action, payload };
                    if member.events.send(event).is_ok() {
                        delivered += 1;
                    }
                },
                Err(error) => {
                    debug!(%error, "undecodable payload, dropping");
                    dropped += 1;
                },
            }
        }
        self.delivered += delivered;
        self.dropped += dropped;
    }
}

/// Shared in-memory network. Clones refer to the same network.
#[derive(Clone, Default)]
pub struct SimNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl SimNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that joins topics as `peer`.
    pub fn transport(&self, peer: impl Into<PeerId>) -> SimTransport {
        SimTransport { network: self.clone(), peer: peer.into() }
    }

    /// Stop delivering raw join events to `peer`.
    pub fn suppress_join_events(&self, peer: &PeerId) {
        self.lock().deaf_to_joins.insert(peer.clone());
    }

    /// Make `open` fail for `peer` (or succeed again).
    pub fn set_unreachable(&self, peer: &PeerId, unreachable: bool) {
        let mut state = self.lock();
        if unreachable {
            state.unreachable.insert(peer.clone());
        } else {
            state.unreachable.remove(peer);
        }
    }

    /// Deliver `payload` on `action` to every member of `topic` except
    /// `from`, as if `from` had broadcast it.
    ///
    /// # Errors
    /// Returns `Unavailable` if the payload cannot be encoded
    pub fn inject(
        &self,
        topic: &SessionTopic,
        from: &PeerId,
        action: ActionKind,
        payload: &Value,
    ) -> Result<(), TransportError> {
        let bytes = encode_value(payload).map_err(|e| TransportError::Unavailable(e.to_string()))?;
        self.lock().deliver(topic, from, action, &bytes, None);
        Ok(())
    }

    /// Members of `topic`.
    pub fn members(&self, topic: &SessionTopic) -> Vec<PeerId> {
        self.lock().topics.get(topic).map(|m| m.keys().cloned().collect()).unwrap_or_default()
    }

    /// Payloads handed to a recipient so far.
    pub fn delivered(&self) -> usize {
        self.lock().delivered
    }

    /// Payloads dropped so far (unregistered action or undecodable).
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }

    fn join(
        &self,
        topic: &SessionTopic,
        peer: &PeerId,
    ) -> Result<UnboundedReceiver<ChannelEvent>, TransportError> {
        let mut state = self.lock();
        if state.unreachable.contains(peer) {
            return Err(TransportError::Unavailable(format!("{peer} cannot reach the network")));
        }

        let (tx, rx) = unbounded_channel();
        let existing: Vec<PeerId> =
            state.topics.get(topic).map(|m| m.keys().cloned().collect()).unwrap_or_default();

        state
            .topics
            .entry(topic.clone())
            .or_default()
            .insert(peer.clone(), Member { events: tx, registered: HashSet::new() });

        for other in existing.iter().filter(|other| *other != peer) {
            if !state.deaf_to_joins.contains(other) {
                state.notify(topic, other, ChannelEvent::PeerJoined(peer.clone()));
            }
            if !state.deaf_to_joins.contains(peer) {
                state.notify(topic, peer, ChannelEvent::PeerJoined(other.clone()));
            }
        }

        debug!(%topic, %peer, existing = existing.len(), "peer joined topic");
        Ok(rx)
    }

    fn leave(&self, topic: &SessionTopic, peer: &PeerId) {
        let mut state = self.lock();
        let Some(members) = state.topics.get_mut(topic) else {
            return;
        };
        if members.remove(peer).is_none() {
            return;
        }

        let remaining: Vec<PeerId> = members.keys().cloned().collect();
        if remaining.is_empty() {
            state.topics.remove(topic);
        }
        for other in &remaining {
            state.notify(topic, other, ChannelEvent::PeerLeft(peer.clone()));
        }
        debug!(%topic, %peer, "peer left topic");
    }

    fn register(&self, topic: &SessionTopic, peer: &PeerId, action: ActionKind) {
        if let Some(member) = self.lock().topics.get_mut(topic).and_then(|m| m.get_mut(peer)) {
            member.registered.insert(action);
        }
    }

    fn is_registered(&self, topic: &SessionTopic, peer: &PeerId, action: ActionKind) -> bool {
        self.lock()
            .topics
            .get(topic)
            .and_then(|m| m.get(peer))
            .is_some_and(|member| member.registered.contains(&action))
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transport bound to one peer identity on a [`SimNetwork`].
#[derive(Clone)]
pub struct SimTransport {
    network: SimNetwork,
    peer: PeerId,
}

impl SimTransport {
    /// The identity this transport joins as.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Channel = SimChannel;

    async fn open(&self, topic: &SessionTopic) -> Result<SimChannel, TransportError> {
        let events = self.network.join(topic, &self.peer)?;
        Ok(SimChannel {
            network: self.network.clone(),
            topic: topic.clone(),
            peer: self.peer.clone(),
            events,
            closed: false,
        })
    }
}

/// One peer's membership of a topic on a [`SimNetwork`].
pub struct SimChannel {
    network: SimNetwork,
    topic: SessionTopic,
    peer: PeerId,
    events: UnboundedReceiver<ChannelEvent>,
    closed: bool,
}

#[async_trait]
impl Channel for SimChannel {
    fn register_action(&mut self, action: ActionKind) {
        self.network.register(&self.topic, &self.peer, action);
    }

    fn send(
        &mut self,
        action: ActionKind,
        payload: &Value,
        to: Option<&PeerId>,
    ) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if !self.network.is_registered(&self.topic, &self.peer, action) {
            return Err(TransportError::Unavailable(format!("action {action} not registered")));
        }

        let bytes = encode_value(payload).map_err(|e| TransportError::Unavailable(e.to_string()))?;
        self.network.lock().deliver(&self.topic, &self.peer, action, &bytes, to);
        Ok(())
    }

    fn peers(&self) -> Vec<PeerId> {
        if self.closed {
            return Vec::new();
        }
        self.network.members(&self.topic).into_iter().filter(|p| *p != self.peer).collect()
    }

    fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }

    async fn recv(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.network.leave(&self.topic, &self.peer);
    }
}

impl Drop for SimChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use doorbell_proto::{Message, PeerRole, PresenceEvent};

    use super::*;

    fn topic() -> SessionTopic {
        SessionTopic::from("doorbell-test")
    }

    async fn open_registered(network: &SimNetwork, peer: &str) -> SimChannel {
        let mut channel = network.transport(peer).open(&topic()).await.unwrap();
        for action in ActionKind::ALL {
            channel.register_action(action);
        }
        channel
    }

    fn drain(channel: &mut SimChannel) -> Vec<ChannelEvent> {
        std::iter::from_fn(|| channel.try_recv()).collect()
    }

    #[tokio::test]
    async fn both_sides_see_raw_joins() {
        let network = SimNetwork::new();
        let mut a = open_registered(&network, "a").await;
        let mut b = open_registered(&network, "b").await;

        assert_eq!(drain(&mut a), vec![ChannelEvent::PeerJoined(PeerId::new("b"))]);
        assert_eq!(drain(&mut b), vec![ChannelEvent::PeerJoined(PeerId::new("a"))]);
        assert_eq!(a.peers(), vec![PeerId::new("b")]);
    }

    #[tokio::test]
    async fn suppressed_peer_misses_joins() {
        let network = SimNetwork::new();
        network.suppress_join_events(&PeerId::new("b"));
        let mut a = open_registered(&network, "a").await;
        let mut b = open_registered(&network, "b").await;

        assert_eq!(drain(&mut a), vec![ChannelEvent::PeerJoined(PeerId::new("b"))]);
        assert!(drain(&mut b).is_empty());
    }

    #[tokio::test]
    async fn payloads_round_trip_through_bytes() {
        let network = SimNetwork::new();
        let mut a = open_registered(&network, "a").await;
        let mut b = open_registered(&network, "b").await;
        drain(&mut b);

        let message = Message::Presence(PresenceEvent { role: PeerRole::Ringer });
        a.send(message.action(), &message.to_value(), None).unwrap();

        assert_eq!(
            b.recv().await,
            Some(ChannelEvent::Received {
                peer: PeerId::new("a"),
                action: ActionKind::Presence,
                payload: message.to_value(),
            })
        );
    }

    #[tokio::test]
    async fn unregistered_actions_are_dropped() {
        let network = SimNetwork::new();
        let mut a = open_registered(&network, "a").await;
        let mut b = network.transport("b").open(&topic()).await.unwrap();
        drain(&mut b);

        a.send(ActionKind::Ring, &Value::Null, None).unwrap();
        assert!(drain(&mut b).is_empty());
        assert_eq!(network.dropped(), 1);
        assert_eq!(
            b.send(ActionKind::Ring, &Value::Null, None),
            Err(TransportError::Unavailable("action ring not registered".into()))
        );
    }

    #[tokio::test]
    async fn close_notifies_remaining_members() {
        let network = SimNetwork::new();
        let mut a = open_registered(&network, "a").await;
        let mut b = open_registered(&network, "b").await;
        drain(&mut a);

        b.close();
        b.close();
        assert_eq!(drain(&mut a), vec![ChannelEvent::PeerLeft(PeerId::new("b"))]);
        assert_eq!(network.members(&topic()), vec![PeerId::new("a")]);
        assert_eq!(b.send(ActionKind::Ring, &Value::Null, None), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn unreachable_peer_cannot_open() {
        let network = SimNetwork::new();
        network.set_unreachable(&PeerId::new("a"), true);
        assert!(matches!(
            network.transport("a").open(&topic()).await,
            Err(TransportError::Unavailable(_))
        ));
    }
}
