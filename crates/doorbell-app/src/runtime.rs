//! Generic runtime for a doorbell session.
//!
//! The [`Runtime`] owns a [`Session`] plus the collaborators it needs to
//! have effects: a [`Transport`] to open channels, a [`SessionObserver`] for
//! notifications and a [`HistoryStore`] for history records. The session
//! decides; the runtime executes.
//!
//! # Event loop
//!
//! ```text
//! loop {
//!     runtime.next().await   // channel event or join-ready deadline
//! }
//! ```
//!
//! Tests that need a deterministic "settled" point call [`Runtime::pump`]
//! instead, which drains every event already queued on the channel and
//! fires due timers without waiting.

use std::future::pending;

use doorbell_core::{
    Channel, ChannelEvent, ConnectionState, Environment, HistoryStore, JoinOptions, MemoryHistory,
    PeerCounts, Session, SessionAction, SessionConfig, SessionError, Transport,
};
use doorbell_proto::{ActionKind, PeerId, SessionTopic};
use tracing::{debug, warn};

use crate::observer::{NoopObserver, SessionObserver};

/// Snapshot of the session for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Connection state
    pub state: ConnectionState,
    /// Handshaken peer counts
    pub counts: PeerCounts,
    /// Peers the transport reports, verified or not
    pub transport_peers: Vec<PeerId>,
    /// Authoritative doorbell name
    pub current_name: Option<String>,
    /// Last join failure
    pub error: Option<String>,
    /// Active topic
    pub topic: Option<SessionTopic>,
}

/// Channel handle tagged with the session epoch that opened it.
struct ActiveChannel<C> {
    epoch: u64,
    channel: C,
}

enum Wake {
    Event(Option<ChannelEvent>),
    Timer,
}

/// Drives one [`Session`] over a [`Transport`].
pub struct Runtime<T: Transport, E: Environment> {
    transport: T,
    env: E,
    session: Session<E>,
    channel: Option<ActiveChannel<T::Channel>>,
    observer: Box<dyn SessionObserver>,
    history: Box<dyn HistoryStore>,
}

impl<T: Transport, E: Environment> Runtime<T, E> {
    /// Create an idle runtime with a no-op observer and in-memory history.
    pub fn new(transport: T, env: E, config: SessionConfig) -> Self {
        Self {
            transport,
            session: Session::new(env.clone(), config),
            env,
            channel: None,
            observer: Box::new(NoopObserver),
            history: Box::new(MemoryHistory::new()),
        }
    }

    /// Replace the notification observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Replace the history store.
    #[must_use]
    pub fn with_history(mut self, history: impl HistoryStore + 'static) -> Self {
        self.history = Box::new(history);
        self
    }

    /// The session state machine.
    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.session.state(),
            counts: self.session.counts(),
            transport_peers: self.channel.as_ref().map(|a| a.channel.peers()).unwrap_or_default(),
            current_name: self.session.current_name().map(str::to_owned),
            error: self.session.last_error().map(str::to_owned),
            topic: self.session.topic().cloned(),
        }
    }

    /// Join `topic`, leaving any current topic first.
    ///
    /// A transport failure is reported through [`ConnectionState::Error`] and
    /// [`SessionStatus::error`], not as a return value.
    pub async fn join(&mut self, topic: SessionTopic, options: JoinOptions) {
        let actions = self.session.join(topic, options);
        if let Some(topic) = self.execute(actions) {
            self.open_channel(topic).await;
        }
    }

    /// Leave the current topic.
    pub fn leave(&mut self) {
        let actions = self.session.leave();
        self.execute(actions);
    }

    /// Broadcast a ring.
    ///
    /// # Errors
    /// Returns `NoActiveChannel` if no topic is joined
    pub fn send_ring(&mut self) -> Result<(), SessionError> {
        let actions = self.session.send_ring()?;
        self.execute(actions);
        Ok(())
    }

    /// Broadcast a display-name update.
    ///
    /// # Errors
    /// Returns `NoActiveChannel` if no topic is joined
    pub fn send_info(&mut self, name: &str) -> Result<(), SessionError> {
        let actions = self.session.send_info(name)?;
        self.execute(actions);
        Ok(())
    }

    /// Process every event already queued on the channel, then fire due
    /// timers. Returns the number of channel events processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.try_next_event() {
            processed += 1;
            let actions = self.session.handle(event);
            self.execute(actions);
        }

        let actions = self.session.tick();
        self.execute(actions);
        processed
    }

    /// Wait for the next channel event or the join-ready deadline and
    /// process it.
    ///
    /// Returns `false` when there is nothing left to wait for: no open
    /// channel and no pending timer.
    pub async fn next(&mut self) -> bool {
        let env = self.env.clone();
        let deadline = self.session.next_deadline();
        let timer = async move {
            match deadline {
                Some(deadline) => env.sleep(deadline.saturating_duration_since(env.now())).await,
                None => pending::<()>().await,
            }
        };

        let epoch = self.session.epoch();
        let wake = match self.channel.as_mut() {
            Some(active) if Some(active.epoch) == epoch => tokio::select! {
                biased;
                event = active.channel.recv() => Wake::Event(event),
                () = timer => Wake::Timer,
            },
            _ if deadline.is_some() => {
                timer.await;
                Wake::Timer
            },
            _ => return false,
        };

        match wake {
            Wake::Event(Some(event)) => {
                let actions = self.session.handle(event);
                self.execute(actions);
            },
            Wake::Event(None) => {
                debug!("channel closed by transport");
                self.channel = None;
            },
            Wake::Timer => {},
        }

        let actions = self.session.tick();
        self.execute(actions);
        true
    }

    fn try_next_event(&mut self) -> Option<ChannelEvent> {
        let epoch = self.session.epoch()?;
        let active = self.channel.as_mut()?;
        if active.epoch != epoch {
            return None;
        }
        active.channel.try_recv()
    }

    async fn open_channel(&mut self, topic: SessionTopic) {
        let Some(epoch) = self.session.epoch() else {
            return;
        };

        match self.transport.open(&topic).await {
            Ok(mut channel) => {
                for action in ActionKind::ALL {
                    channel.register_action(action);
                }
                debug!(%topic, epoch, "channel open");
                self.channel = Some(ActiveChannel { epoch, channel });
            },
            Err(error) => {
                let actions = self.session.join_failed(error.to_string());
                self.execute(actions);
            },
        }
    }

    /// Execute actions in order. Returns the topic of a requested channel
    /// open, which needs an `.await` the caller performs.
    fn execute(&mut self, actions: Vec<SessionAction>) -> Option<SessionTopic> {
        let mut open = None;
        for action in actions {
            match action {
                SessionAction::OpenChannel { topic } => open = Some(topic),
                SessionAction::CloseChannel => {
                    if let Some(mut previous) = self.channel.take() {
                        debug!(epoch = previous.epoch, "closing channel");
                        previous.channel.close();
                    }
                },
                SessionAction::Send { to, message } => {
                    let Some(active) = self.channel.as_mut() else {
                        debug!(action = %message.action(), "no channel, dropping send");
                        continue;
                    };
                    if let Err(error) =
                        active.channel.send(message.action(), &message.to_value(), to.as_ref())
                    {
                        warn!(%error, action = %message.action(), "send failed");
                    }
                },
                SessionAction::Notify(notification) => self.observer.notify(&notification),
                SessionAction::RecordHistory(record) => self.history.apply(&record),
            }
        }
        open
    }
}
