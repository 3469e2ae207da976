//! Session state machine for the doorbell protocol.
//!
//! A session is one membership of a topic: it owns the presence table, the
//! ring nonce window and the join-ready timer for that topic, and shares the
//! process-lifetime Lamport clock with every later session.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Operations return `Vec<SessionAction>` (or `Result` for sends)
//! - The driver executes actions: open/close the transport channel, send
//!   messages, forward notifications, persist history
//! - Time and randomness come from the [`Environment`]
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐  join   ┌────────────┐  first known peer  ┌───────────┐
//! │ Initializing │────────>│ Connecting │───────────────────>│ Connected │
//! └──────────────┘         └────────────┘  or ready timeout  └───────────┘
//!        ^                   │      ^                              │
//!        │ leave             │      └──────────────────────────────┘
//!        │                   │ join    last known peer left
//!        │                   │ failed
//!        │              ┌─────────┐
//!        └──────────────│  Error  │  (terminal until the next join)
//!                       └─────────┘
//! ```
//!
//! # Supersession
//!
//! A new `join` tears down the previous session before opening the new
//! channel: the ready timer is dropped with the old session state and the
//! clock forgets its peers. Each session carries an epoch so drivers can
//! discard events from a channel that has been superseded.

use std::time::{Duration, Instant};

use ciborium::Value;
use doorbell_proto::{
    ActionKind, DEFAULT_MAX_DRIFT_MS, InfoEvent, Message, PeerId, PeerRole, Rejection, RingEvent,
    SessionTopic, validate_info, validate_presence, validate_ring,
};
use tracing::{debug, error, info, warn};

use crate::{
    clock::LamportClock,
    env::Environment,
    error::SessionError,
    history::HistoryRecord,
    nonce::NonceWindow,
    presence::{PresenceAction, PresenceTracker},
    transport::ChannelEvent,
};

/// What to do when the join timeout elapses with nobody connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyPolicy {
    /// Report `Connected`: the doorbell is reachable even with no peers yet.
    Optimistic,
    /// Stay `Connecting` until a peer completes the handshake.
    AwaitPeer,
}

/// Product decision: show "ready" after the join timeout even with zero peers.
pub const DEFAULT_READY_POLICY: ReadyPolicy = ReadyPolicy::Optimistic;

/// Default join-ready timeout.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest display name we send, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 50;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time after join before the ready policy applies
    pub join_timeout: Duration,
    /// Behaviour when the join timeout elapses with no peers
    pub ready_policy: ReadyPolicy,
    /// Maximum ring timestamp drift either side of local time
    pub max_ring_drift: Duration,
    /// Ring nonces remembered for de-duplication (0 disables it)
    pub nonce_window: usize,
    /// Display names are truncated to this many characters
    pub max_name_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            ready_policy: DEFAULT_READY_POLICY,
            max_ring_drift: Duration::from_millis(DEFAULT_MAX_DRIFT_MS),
            nonce_window: 0,
            max_name_len: MAX_DISPLAY_NAME_LEN,
        }
    }
}

/// Connection state reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session
    Initializing,
    /// Channel open, waiting for a peer or the ready timeout
    Connecting,
    /// At least one known peer, or the ready timeout elapsed
    Connected,
    /// Join failed; see [`Session::last_error`]
    Error,
}

/// How to join a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    /// Role declared to every peer
    pub role: PeerRole,
    /// Display name announced to new peers (doorbells only)
    pub display_name: Option<String>,
    /// Secret token the topic was derived from. History is only recorded
    /// when it is set.
    pub token: Option<String>,
}

impl JoinOptions {
    /// Join as the doorbell owner, announcing `name`.
    pub fn doorbell(name: impl Into<String>) -> Self {
        Self { role: PeerRole::Doorbell, display_name: Some(name.into()), token: None }
    }

    /// Join as a ringer.
    pub fn ringer() -> Self {
        Self { role: PeerRole::Ringer, display_name: None, token: None }
    }

    /// Attach the secret token behind the topic being joined.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Handshaken peer counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerCounts {
    /// Known peers
    pub peers: usize,
    /// Known peers that declared the doorbell role
    pub doorbells: usize,
}

/// Notifications for the UI / notification layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
    /// A validated ring arrived
    Ring {
        /// Sender
        peer: PeerId,
        /// The ring
        event: RingEvent,
    },
    /// The authoritative display name changed
    Info {
        /// Sender
        peer: PeerId,
        /// The accepted update
        event: InfoEvent,
    },
    /// A peer completed the presence handshake
    PeerJoined {
        /// The peer
        peer: PeerId,
        /// Its declared role
        role: PeerRole,
    },
    /// A peer left, verified or not
    PeerLeft {
        /// The peer
        peer: PeerId,
    },
    /// Known peer counts changed
    PeerCountChanged(PeerCounts),
    /// Connection state changed
    ConnectionStateChanged(ConnectionState),
}

/// Actions for the driver to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Join the transport topic and register the protocol actions
    OpenChannel {
        /// Topic to join
        topic: SessionTopic,
    },
    /// Leave the current transport topic
    CloseChannel,
    /// Send a message to one peer, or broadcast if `to` is `None`
    Send {
        /// Recipient
        to: Option<PeerId>,
        /// Message
        message: Message,
    },
    /// Forward to the notification layer
    Notify(SessionNotification),
    /// Forward to the history store
    RecordHistory(HistoryRecord),
}

/// State owned by one topic membership.
#[derive(Debug)]
struct ActiveSession {
    epoch: u64,
    topic: SessionTopic,
    role: PeerRole,
    display_name: Option<String>,
    token: Option<String>,
    presence: PresenceTracker,
    nonces: NonceWindow,
    ready_deadline: Option<Instant>,
}

/// Session state machine
///
/// Pure: no I/O. Holds the environment for time and randomness only.
#[derive(Debug)]
pub struct Session<E: Environment> {
    env: E,
    config: SessionConfig,
    state: ConnectionState,
    clock: LamportClock,
    epoch: u64,
    active: Option<ActiveSession>,
    counts: PeerCounts,
    current_name: Option<String>,
    last_error: Option<String>,
}

impl<E: Environment> Session<E> {
    /// Create an idle session.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self {
            env,
            config,
            state: ConnectionState::Initializing,
            clock: LamportClock::new(),
            epoch: 0,
            active: None,
            counts: PeerCounts::default(),
            current_name: None,
            last_error: None,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Known peer counts.
    pub fn counts(&self) -> PeerCounts {
        self.counts
    }

    /// Authoritative doorbell name, if one has been received.
    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    /// Message of the last join failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Topic of the active session.
    pub fn topic(&self) -> Option<&SessionTopic> {
        self.active.as_ref().map(|a| &a.topic)
    }

    /// Role of the active session.
    pub fn role(&self) -> Option<PeerRole> {
        self.active.as_ref().map(|a| a.role)
    }

    /// Epoch of the active session, `None` if there is none.
    pub fn epoch(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.epoch)
    }

    /// Whether a channel is open.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Declared role of a known peer.
    pub fn peer_role(&self, peer: &PeerId) -> Option<PeerRole> {
        self.active.as_ref().and_then(|a| a.presence.role_of(peer))
    }

    /// The Lamport clock.
    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// When [`Session::tick`] next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.as_ref().and_then(|a| a.ready_deadline)
    }

    /// Join `topic`, superseding any current session.
    ///
    /// Keeps `Connected` if the superseded session was connected: the network
    /// underneath stays up while the logical session changes.
    pub fn join(&mut self, topic: SessionTopic, options: JoinOptions) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        let was_connected = self.active.is_some() && self.state == ConnectionState::Connected;

        self.teardown(&mut actions);
        self.epoch += 1;
        self.last_error = None;
        self.current_name = None;

        let next =
            if was_connected { ConnectionState::Connected } else { ConnectionState::Connecting };
        self.set_state(next, &mut actions);
        self.set_counts(PeerCounts::default(), &mut actions);

        info!(%topic, role = %options.role, epoch = self.epoch, "joining topic");
        actions.push(SessionAction::OpenChannel { topic: topic.clone() });

        let display_name = options.display_name.map(|name| self.normalize_name(&name));
        if options.role == PeerRole::Doorbell
            && let Some(token) = options.token.clone()
        {
            actions.push(SessionAction::RecordHistory(HistoryRecord::DoorbellUse {
                token,
                name: display_name.clone().unwrap_or_default(),
                at_ms: self.env.wall_clock_ms(),
            }));
        }

        self.active = Some(ActiveSession {
            epoch: self.epoch,
            topic,
            role: options.role,
            display_name,
            token: options.token,
            presence: PresenceTracker::new(options.role),
            nonces: NonceWindow::new(self.config.nonce_window),
            ready_deadline: Some(self.env.now() + self.config.join_timeout),
        });

        actions
    }

    /// The transport could not open the channel for the current join.
    ///
    /// Terminal until the next explicit [`Session::join`].
    pub fn join_failed(&mut self, reason: impl Into<String>) -> Vec<SessionAction> {
        let reason = reason.into();
        error!(error = %reason, "join failed");

        let mut actions = Vec::new();
        // The channel never opened, so there is nothing to close
        self.active = None;
        self.clock.clear_peers();
        self.last_error = Some(reason);
        self.set_counts(PeerCounts::default(), &mut actions);
        self.set_state(ConnectionState::Error, &mut actions);
        actions
    }

    /// Leave the current session and return to `Initializing`.
    pub fn leave(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if let Some(topic) = self.topic() {
            info!(%topic, "leaving topic");
        }

        self.teardown(&mut actions);
        self.current_name = None;
        self.last_error = None;
        self.set_counts(PeerCounts::default(), &mut actions);
        self.set_state(ConnectionState::Initializing, &mut actions);
        actions
    }

    /// Broadcast a ring with the current time and a fresh nonce.
    ///
    /// # Errors
    /// Returns `NoActiveChannel` if no session is active
    pub fn send_ring(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let Some(active) = self.active.as_ref() else {
            warn!("cannot send ring: no channel");
            return Err(SessionError::NoActiveChannel);
        };

        let timestamp = self.env.wall_clock_ms();
        let event = RingEvent { timestamp, nonce: self.fresh_nonce() };
        info!(topic = %active.topic, nonce = %event.nonce, "sending ring");

        let mut actions = vec![SessionAction::Send { to: None, message: event.into() }];
        if active.role == PeerRole::Ringer
            && let Some(token) = active.token.clone()
        {
            actions.push(SessionAction::RecordHistory(HistoryRecord::RingerVisit {
                token,
                name: self.current_name.clone().unwrap_or_default(),
                at_ms: timestamp,
            }));
        }
        Ok(actions)
    }

    /// Broadcast a display-name update.
    ///
    /// Ticks the clock once. The name is also remembered and announced to
    /// peers that complete the handshake later.
    ///
    /// # Errors
    /// Returns `NoActiveChannel` if no session is active
    pub fn send_info(&mut self, name: &str) -> Result<Vec<SessionAction>, SessionError> {
        let name = self.normalize_name(name);
        let Some(active) = self.active.as_mut() else {
            warn!("cannot send info: no channel");
            return Err(SessionError::NoActiveChannel);
        };

        active.display_name = Some(name.clone());
        let clock = self.clock.tick();
        info!(topic = %active.topic, %name, clock, "sending info");

        Ok(vec![SessionAction::Send { to: None, message: InfoEvent { name, clock }.into() }])
    }

    /// Fire due timers.
    ///
    /// The ready timer only moves `Connecting` to `Connected`; if something
    /// more specific already changed the state, it does nothing.
    pub fn tick(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        let now = self.env.now();

        let Some(active) = self.active.as_mut() else {
            return actions;
        };
        match active.ready_deadline {
            Some(deadline) if deadline <= now => active.ready_deadline = None,
            _ => return actions,
        }

        debug!(epoch = active.epoch, state = ?self.state, "join timeout elapsed");
        if self.state == ConnectionState::Connecting
            && self.config.ready_policy == ReadyPolicy::Optimistic
        {
            self.set_state(ConnectionState::Connected, &mut actions);
        }
        actions
    }

    /// Process a channel event.
    ///
    /// Malformed, stale and drifted messages are logged and dropped.
    pub fn handle(&mut self, event: ChannelEvent) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if self.active.is_none() {
            debug!(?event, "dropping event: no active session");
            return actions;
        }

        match event {
            ChannelEvent::PeerJoined(peer) => self.on_raw_join(peer, &mut actions),
            ChannelEvent::PeerLeft(peer) => self.on_peer_left(peer, &mut actions),
            ChannelEvent::Received { peer, action, payload } => match action {
                ActionKind::Presence => self.on_presence(peer, &payload, &mut actions),
                ActionKind::Info => self.on_info(peer, &payload, &mut actions),
                ActionKind::Ring => self.on_ring(peer, &payload, &mut actions),
            },
        }
        actions
    }

    fn on_raw_join(&mut self, peer: PeerId, actions: &mut Vec<SessionAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        info!(%peer, "peer joined (raw)");
        let presence_actions = active.presence.on_raw_join(peer);
        push_presence_actions(presence_actions, actions);
    }

    fn on_peer_left(&mut self, peer: PeerId, actions: &mut Vec<SessionAction>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let mut was_known = false;
        for action in active.presence.on_leave(peer) {
            if let PresenceAction::PeerGone { peer, role } = action {
                info!(%peer, ?role, "peer left");
                was_known = role.is_some();
                actions.push(SessionAction::Notify(SessionNotification::PeerLeft { peer }));
            }
        }

        self.refresh_counts(actions);
        if was_known && self.counts.peers == 0 && self.state == ConnectionState::Connected {
            self.set_state(ConnectionState::Connecting, actions);
        }
    }

    fn on_presence(&mut self, peer: PeerId, payload: &Value, actions: &mut Vec<SessionAction>) {
        let event = match validate_presence(payload) {
            Ok(event) => event,
            Err(rejection) => {
                warn!(%peer, %rejection, "dropping invalid presence");
                return;
            },
        };
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let mut newly_known = None;
        for action in active.presence.on_presence(peer, event) {
            match action {
                PresenceAction::PeerKnown { peer, role } => newly_known = Some((peer, role)),
                other => push_presence_actions(vec![other], actions),
            }
        }

        if let Some((peer, role)) = newly_known {
            info!(%peer, %role, "presence handshake complete");
            actions.push(SessionAction::Notify(SessionNotification::PeerJoined {
                peer: peer.clone(),
                role,
            }));

            if active.role == PeerRole::Doorbell
                && let Some(name) = active.display_name.clone().filter(|n| !n.is_empty())
            {
                let clock = self.clock.tick();
                actions.push(SessionAction::Send {
                    to: Some(peer),
                    message: InfoEvent { name, clock }.into(),
                });
            }

            // A verified peer ends the wait for the ready timeout
            active.ready_deadline = None;
            self.set_state(ConnectionState::Connected, actions);
        }

        self.refresh_counts(actions);
    }

    fn on_info(&mut self, peer: PeerId, payload: &Value, actions: &mut Vec<SessionAction>) {
        let event = match validate_info(payload) {
            Ok(event) => event,
            Err(rejection) => {
                warn!(%peer, %rejection, "dropping invalid info");
                return;
            },
        };

        if !self.clock.receive(&peer, event.clock) {
            debug!(%peer, clock = event.clock, last_seen = self.clock.last_seen(&peer), "ignoring stale info");
            return;
        }

        info!(%peer, name = %event.name, clock = event.clock, "info accepted");
        self.current_name = Some(event.name.clone());
        actions.push(SessionAction::Notify(SessionNotification::Info { peer, event }));
    }

    fn on_ring(&mut self, peer: PeerId, payload: &Value, actions: &mut Vec<SessionAction>) {
        let now_ms = self.env.wall_clock_ms();
        let max_drift_ms = self.config.max_ring_drift.as_millis() as u64;

        let event = match validate_ring(payload, now_ms, max_drift_ms) {
            Ok(event) => event,
            Err(Rejection::TimestampDrift { drift_ms, max_drift_ms }) => {
                warn!(%peer, drift_ms, max_drift_ms, "dropping ring: timestamp drift (clock skew or replay)");
                return;
            },
            Err(rejection) => {
                warn!(%peer, %rejection, "dropping invalid ring");
                return;
            },
        };
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if !active.nonces.insert(&event.nonce) {
            debug!(%peer, nonce = %event.nonce, "dropping duplicate ring");
            return;
        }

        info!(%peer, "ring received");
        if active.role == PeerRole::Doorbell
            && let Some(token) = active.token.clone()
        {
            actions.push(SessionAction::RecordHistory(HistoryRecord::DoorbellUse {
                token,
                name: active.display_name.clone().unwrap_or_default(),
                at_ms: now_ms,
            }));
        }
        actions.push(SessionAction::Notify(SessionNotification::Ring { peer, event }));
    }

    fn teardown(&mut self, actions: &mut Vec<SessionAction>) {
        self.clock.clear_peers();
        if let Some(previous) = self.active.take() {
            debug!(topic = %previous.topic, epoch = previous.epoch, "tearing down session");
            actions.push(SessionAction::CloseChannel);
        }
    }

    fn set_state(&mut self, state: ConnectionState, actions: &mut Vec<SessionAction>) {
        if self.state == state {
            return;
        }

        debug!(from = ?self.state, to = ?state, "connection state changed");
        self.state = state;
        actions.push(SessionAction::Notify(SessionNotification::ConnectionStateChanged(state)));
    }

    fn set_counts(&mut self, counts: PeerCounts, actions: &mut Vec<SessionAction>) {
        if self.counts == counts {
            return;
        }

        self.counts = counts;
        actions.push(SessionAction::Notify(SessionNotification::PeerCountChanged(counts)));
    }

    fn refresh_counts(&mut self, actions: &mut Vec<SessionAction>) {
        let counts = self.active.as_ref().map_or_else(PeerCounts::default, |a| PeerCounts {
            peers: a.presence.known_count(),
            doorbells: a.presence.count_role(PeerRole::Doorbell),
        });
        self.set_counts(counts, actions);
    }

    fn normalize_name(&self, name: &str) -> String {
        name.trim().chars().take(self.config.max_name_len).collect()
    }

    /// Random UUID-v4-shaped nonce.
    fn fresh_nonce(&self) -> String {
        let mut b = [0u8; 16];
        self.env.random_bytes(&mut b);
        b[6] = (b[6] & 0x0f) | 0x40;
        b[8] = (b[8] & 0x3f) | 0x80;
        format!(
            "{}-{}-{}-{}-{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..16])
        )
    }
}

fn push_presence_actions(presence_actions: Vec<PresenceAction>, actions: &mut Vec<SessionAction>) {
    for action in presence_actions {
        if let PresenceAction::Announce { to, event } = action {
            actions.push(SessionAction::Send { to: Some(to), message: event.into() });
        }
    }
}
