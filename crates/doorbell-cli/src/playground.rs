//! Two sessions in one process.
//!
//! The owner ("door") and the ringer ("visitor") each run a full
//! [`Runtime`] over their own transport on a shared in-memory network.
//! Observers collect human-readable lines that the binary prints.

use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};

use doorbell_app::{Runtime, SessionObserver, SessionStatus, SystemEnv};
use doorbell_core::{
    ConnectionState, JoinOptions, PeerCounts, SessionConfig, SessionError,
    topic::{derive_topic, generate_token, ring_path},
};
use doorbell_harness::{SimEnv, SimNetwork, SimTransport};
use doorbell_proto::{InfoEvent, PeerId, PeerRole, RingEvent};
use thiserror::Error;
use tracing::info;

use crate::commands::{Command, HELP, Side};

/// Errors surfaced to the user.
#[derive(Debug, Error)]
pub enum PlaygroundError {
    /// A send was attempted without a joined topic.
    #[error("{side}: {source}")]
    Session {
        /// Which side failed
        side: &'static str,
        /// Underlying error
        #[source]
        source: SessionError,
    },

    /// Writing output failed.
    #[error("output: {0}")]
    Io(#[from] std::io::Error),
}

type Lines = Arc<Mutex<Vec<String>>>;

/// Observer that turns notifications into console lines.
struct ConsoleObserver {
    label: &'static str,
    lines: Lines,
}

impl ConsoleObserver {
    fn push(&self, line: String) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).push(format!("[{}] {line}", self.label));
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_ring(&mut self, peer: &PeerId, event: &RingEvent) {
        self.push(format!("RING from {peer} (nonce {})", event.nonce));
    }

    fn on_info(&mut self, peer: &PeerId, event: &InfoEvent) {
        self.push(format!("doorbell is now \"{}\" (from {peer}, clock {})", event.name, event.clock));
    }

    fn on_peer_joined(&mut self, peer: &PeerId, role: PeerRole) {
        self.push(format!("{peer} joined as {role}"));
    }

    fn on_peer_left(&mut self, peer: &PeerId) {
        self.push(format!("{peer} left"));
    }

    fn on_peer_count_changed(&mut self, counts: PeerCounts) {
        self.push(format!("{} peer(s), {} doorbell(s)", counts.peers, counts.doorbells));
    }

    fn on_connection_state_changed(&mut self, state: ConnectionState) {
        self.push(format!("connection {state:?}"));
    }
}

/// Owner and ringer sharing one in-memory network.
pub struct Playground {
    token: String,
    name: String,
    door: Runtime<SimTransport, SystemEnv>,
    visitor: Runtime<SimTransport, SystemEnv>,
    lines: Lines,
}

impl Playground {
    /// Build both runtimes. `token` is generated if not supplied.
    pub fn new(
        name: String,
        token: Option<String>,
        seed: Option<u64>,
        config: &SessionConfig,
    ) -> Self {
        let token = token.unwrap_or_else(|| match seed {
            Some(seed) => generate_token(&SimEnv::with_seed(seed)),
            None => generate_token(&SystemEnv),
        });

        let network = SimNetwork::new();
        let lines = Lines::default();
        let door = Runtime::new(network.transport("door"), SystemEnv, config.clone())
            .with_observer(ConsoleObserver { label: "door", lines: lines.clone() });
        let visitor = Runtime::new(network.transport("visitor"), SystemEnv, config.clone())
            .with_observer(ConsoleObserver { label: "visitor", lines: lines.clone() });

        Self { token, name, door, visitor, lines }
    }

    /// The doorbell's secret token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Run one command. Returns `false` when the user asked to quit.
    pub async fn execute(&mut self, command: Command) -> Result<bool, PlaygroundError> {
        match command {
            Command::Open => {
                let topic = derive_topic(&self.token);
                info!(%topic, "owner opening doorbell");
                let options = JoinOptions::doorbell(self.name.clone()).with_token(&self.token);
                self.door.join(topic, options).await;
                self.say(format!("share this link: {}", ring_path(&self.token)));
            },
            Command::Visit { token } => {
                let token = token.unwrap_or_else(|| self.token.clone());
                self.visitor.join(derive_topic(&token), JoinOptions::ringer().with_token(token)).await;
            },
            Command::Ring => self
                .visitor
                .send_ring()
                .map_err(|source| PlaygroundError::Session { side: "visitor", source })?,
            Command::Rename { name } => {
                self.door
                    .send_info(&name)
                    .map_err(|source| PlaygroundError::Session { side: "door", source })?;
                self.name = name;
            },
            Command::Leave { side: Side::Door } => self.door.leave(),
            Command::Leave { side: Side::Visitor } => self.visitor.leave(),
            Command::Status => {
                let door = describe(&self.door.status());
                let visitor = describe(&self.visitor.status());
                self.say(format!("door: {door}"));
                self.say(format!("visitor: {visitor}"));
            },
            Command::Help => self.say(HELP.to_string()),
            Command::Quit => return Ok(false),
            Command::Empty => {},
            Command::Unknown { input } => self.say(format!("unknown command: {input} (try /help)")),
            Command::InvalidArgs { command, error } => self.say(format!("/{command}: {error}")),
        }
        Ok(true)
    }

    /// Process pending events on both sides and fire due timers.
    pub fn pump(&mut self) {
        loop {
            let processed = self.door.pump() + self.visitor.pump();
            if processed == 0 {
                break;
            }
        }
    }

    /// Write and clear collected output lines.
    pub fn flush(&mut self, out: &mut impl Write) -> Result<(), PlaygroundError> {
        let lines = std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner));
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn say(&self, line: String) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).push(line);
    }
}

fn describe(status: &SessionStatus) -> String {
    let topic = status.topic.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
    let mut line = format!(
        "{:?} on {topic}, {} known / {} transport peer(s)",
        status.state,
        status.counts.peers,
        status.transport_peers.len()
    );
    if let Some(name) = &status.current_name {
        line.push_str(&format!(", doorbell \"{name}\""));
    }
    if let Some(error) = &status.error {
        line.push_str(&format!(", error: {error}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse;

    async fn run(playground: &mut Playground, input: &str) -> String {
        playground.execute(parse(input)).await.unwrap();
        playground.pump();
        let mut out = Vec::new();
        playground.flush(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn playground() -> Playground {
        Playground::new("Front Door".into(), None, Some(1), &SessionConfig::default())
    }

    #[tokio::test]
    async fn open_visit_ring_rename() {
        let mut p = playground();

        assert!(run(&mut p, "/open").await.contains(&format!("/ring/{}", p.token())));
        let joined = run(&mut p, "/visit").await;
        assert!(joined.contains("[visitor] door joined as doorbell"), "{joined}");
        assert!(joined.contains("[visitor] doorbell is now \"Front Door\""), "{joined}");

        assert!(run(&mut p, "/ring").await.contains("[door] RING from visitor"));
        assert!(run(&mut p, "/name Back Door").await.contains("doorbell is now \"Back Door\""));
        assert!(run(&mut p, "/status").await.contains("Connected"));
    }

    #[tokio::test]
    async fn ring_without_visit_is_an_error() {
        let mut p = playground();
        let error = p.execute(Command::Ring).await.unwrap_err();
        assert!(matches!(
            error,
            PlaygroundError::Session { side: "visitor", source: SessionError::NoActiveChannel }
        ));
    }

    #[tokio::test]
    async fn seeded_token_is_stable() {
        let a = playground();
        let b = playground();
        assert_eq!(a.token(), b.token());
    }

    #[tokio::test]
    async fn quit_stops() {
        let mut p = playground();
        assert!(!p.execute(Command::Quit).await.unwrap());
    }
}
