//! World state for scenario execution.
//!
//! The World owns every actor's [`Session`] for one topic and plays the part
//! of the transport between them: raw join/leave notifications are injected
//! explicitly and messages sit in an in-flight queue until a step delivers or
//! drops them. This gives scenarios full control over delivery order.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    time::Duration,
};

use doorbell_core::{ChannelEvent, JoinOptions, Session, SessionAction, SessionNotification};
use doorbell_proto::{Message, PeerId, PeerRole, SessionTopic};

use crate::sim_env::SimEnv;

/// Upper bound on deliveries in one [`World::deliver_all`] call.
const MAX_DELIVERIES: usize = 10_000;

/// A message between two actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sending actor
    pub from: String,
    /// Receiving actor
    pub to: String,
    /// The message
    pub message: Message,
}

/// World state containing all actors and metrics.
pub struct World {
    env: SimEnv,
    topic: SessionTopic,
    sessions: BTreeMap<String, Session<SimEnv>>,
    roles: HashMap<String, PeerRole>,
    in_flight: VecDeque<Envelope>,
    messages_sent: HashMap<String, usize>,
    messages_received: HashMap<String, usize>,
    notifications: HashMap<String, Vec<SessionNotification>>,
}

impl World {
    /// Create an empty world on `topic`.
    pub fn new(env: SimEnv, topic: SessionTopic) -> Self {
        Self {
            env,
            topic,
            sessions: BTreeMap::new(),
            roles: HashMap::new(),
            in_flight: VecDeque::new(),
            messages_sent: HashMap::new(),
            messages_received: HashMap::new(),
            notifications: HashMap::new(),
        }
    }

    /// Add an actor and join it to the topic.
    pub fn add_peer(&mut self, name: String, mut session: Session<SimEnv>, options: JoinOptions) {
        self.roles.insert(name.clone(), options.role);
        let actions = session.join(self.topic.clone(), options);
        self.sessions.insert(name.clone(), session);
        self.messages_sent.insert(name.clone(), 0);
        self.messages_received.insert(name.clone(), 0);
        self.apply(&name, actions);
    }

    /// Shared simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Get an actor's session by name.
    pub fn session(&self, name: &str) -> Option<&Session<SimEnv>> {
        self.sessions.get(name)
    }

    /// Role an actor joined with.
    pub fn role(&self, name: &str) -> Option<PeerRole> {
        self.roles.get(name).copied()
    }

    /// All actor names, sorted.
    pub fn actor_names(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// `observer` gets the transport's raw join notification for `joined`.
    pub fn raw_join(&mut self, observer: &str, joined: &str) -> Result<(), String> {
        self.handle(observer, ChannelEvent::PeerJoined(PeerId::new(joined)))
    }

    /// `observer` gets the transport's leave notification for `left`.
    ///
    /// Messages still in flight between the two are lost.
    pub fn peer_left(&mut self, observer: &str, left: &str) -> Result<(), String> {
        self.in_flight.retain(|e| !(e.from == left && e.to == observer));
        self.handle(observer, ChannelEvent::PeerLeft(PeerId::new(left)))
    }

    /// Deliver the oldest in-flight message. Returns `false` if none.
    pub fn deliver_next(&mut self) -> Result<bool, String> {
        let Some(envelope) = self.in_flight.pop_front() else {
            return Ok(false);
        };

        *self.messages_received.entry(envelope.to.clone()).or_insert(0) += 1;
        let event = ChannelEvent::Received {
            peer: PeerId::new(envelope.from),
            action: envelope.message.action(),
            payload: envelope.message.to_value(),
        };
        self.handle(&envelope.to, event)?;
        Ok(true)
    }

    /// Deliver until nothing is in flight, including replies. Returns the
    /// number of messages delivered.
    pub fn deliver_all(&mut self) -> Result<usize, String> {
        let mut delivered = 0;
        while self.deliver_next()? {
            delivered += 1;
            if delivered > MAX_DELIVERIES {
                return Err(format!("no quiescence after {MAX_DELIVERIES} deliveries"));
            }
        }
        Ok(delivered)
    }

    /// Reverse the in-flight queue, so the newest message is delivered first.
    pub fn reverse_in_flight(&mut self) {
        self.in_flight.make_contiguous().reverse();
    }

    /// `actor` broadcasts a display-name update.
    pub fn send_info(&mut self, actor: &str, name: &str) -> Result<(), String> {
        let session =
            self.sessions.get_mut(actor).ok_or_else(|| format!("unknown actor {actor}"))?;
        let actions = session.send_info(name).map_err(|e| format!("{actor}: send_info: {e}"))?;
        self.apply(actor, actions);
        Ok(())
    }

    /// `actor` broadcasts a ring.
    pub fn send_ring(&mut self, actor: &str) -> Result<(), String> {
        let session =
            self.sessions.get_mut(actor).ok_or_else(|| format!("unknown actor {actor}"))?;
        let actions = session.send_ring().map_err(|e| format!("{actor}: send_ring: {e}"))?;
        self.apply(actor, actions);
        Ok(())
    }

    /// Lose every in-flight message. Returns how many were dropped.
    pub fn drop_in_flight(&mut self) -> usize {
        let dropped = self.in_flight.len();
        self.in_flight.clear();
        dropped
    }

    /// Advance virtual time and let every session fire its timers.
    pub fn advance(&mut self, duration: Duration) {
        self.env.advance(duration);
        for name in self.actor_names() {
            if let Some(session) = self.sessions.get_mut(&name) {
                let actions = session.tick();
                self.apply(&name, actions);
            }
        }
    }

    /// Messages currently in flight.
    pub fn in_flight(&self) -> &VecDeque<Envelope> {
        &self.in_flight
    }

    /// Number of messages sent by an actor.
    pub fn messages_sent(&self, actor: &str) -> usize {
        self.messages_sent.get(actor).copied().unwrap_or(0)
    }

    /// Number of messages delivered to an actor.
    pub fn messages_received(&self, actor: &str) -> usize {
        self.messages_received.get(actor).copied().unwrap_or(0)
    }

    /// Notifications an actor's session emitted, in order.
    pub fn notifications(&self, actor: &str) -> &[SessionNotification] {
        self.notifications.get(actor).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether every actor knows every other actor's declared role.
    pub fn all_known(&self) -> bool {
        self.sessions.iter().all(|(name, session)| {
            self.roles.iter().filter(|(other, _)| *other != name).all(|(other, role)| {
                session.peer_role(&PeerId::new(other.as_str())) == Some(*role)
            })
        })
    }

    fn handle(&mut self, actor: &str, event: ChannelEvent) -> Result<(), String> {
        let session =
            self.sessions.get_mut(actor).ok_or_else(|| format!("unknown actor {actor}"))?;
        let actions = session.handle(event);
        self.apply(actor, actions);
        Ok(())
    }

    fn apply(&mut self, actor: &str, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Send { to: Some(to), message } => {
                    self.send(actor, to.as_str().to_string(), message);
                },
                SessionAction::Send { to: None, message } => {
                    let others: Vec<String> =
                        self.sessions.keys().filter(|n| n.as_str() != actor).cloned().collect();
                    for other in others {
                        self.send(actor, other, message.clone());
                    }
                },
                SessionAction::Notify(notification) => {
                    self.notifications.entry(actor.to_string()).or_default().push(notification);
                },
                // The world is the channel, and history is out of scope here
                SessionAction::OpenChannel { .. }
                | SessionAction::CloseChannel
                | SessionAction::RecordHistory(_) => {},
            }
        }
    }

    fn send(&mut self, from: &str, to: String, message: Message) {
        *self.messages_sent.entry(from.to_string()).or_insert(0) += 1;
        self.in_flight.push_back(Envelope { from: from.to_string(), to, message });
    }
}
