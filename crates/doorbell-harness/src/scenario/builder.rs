//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use doorbell_core::{JoinOptions, Session, SessionConfig};
use doorbell_proto::SessionTopic;

use crate::{
    scenario::{OracleFn, World},
    sim_env::SimEnv,
};

/// One transport-level event in a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `observer` sees the raw transport join of `joined`
    RawJoin {
        /// Actor receiving the notification
        observer: String,
        /// Actor that joined
        joined: String,
    },
    /// `observer` sees `left` leave
    PeerLeft {
        /// Actor receiving the notification
        observer: String,
        /// Actor that left
        left: String,
    },
    /// Deliver the oldest in-flight message
    DeliverNext,
    /// Deliver until quiescent
    DeliverAll,
    /// Lose every in-flight message
    DropInFlight,
    /// Deliver newest-first from here on
    ReverseInFlight,
    /// `actor` broadcasts a display-name update
    SendInfo {
        /// Sender
        actor: String,
        /// New name
        name: String,
    },
    /// `actor` broadcasts a ring
    SendRing {
        /// Sender
        actor: String,
    },
    /// Advance virtual time and fire timers
    Advance(Duration),
}

/// Scenario builder.
///
/// Construct a scenario by adding actors and steps. Must call `.oracle()` to
/// get a [`RunnableScenario`] that can be executed.
pub struct Scenario {
    name: String,
    seed: u64,
    topic: SessionTopic,
    config: SessionConfig,
    actors: Vec<(String, JoinOptions)>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: 0,
            topic: SessionTopic::from("doorbell-scenario"),
            config: SessionConfig::default(),
            actors: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Seed for the shared environment's RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Session configuration used by every actor.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an actor joining as the doorbell owner.
    pub fn doorbell(self, name: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.actor(name, JoinOptions::doorbell(display_name))
    }

    /// Add an actor joining as a ringer.
    pub fn ringer(self, name: impl Into<String>) -> Self {
        self.actor(name, JoinOptions::ringer())
    }

    /// Add an actor with explicit join options.
    pub fn actor(mut self, name: impl Into<String>, options: JoinOptions) -> Self {
        self.actors.push((name.into(), options));
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// `observer` sees the raw transport join of `joined`.
    pub fn raw_join(self, observer: impl Into<String>, joined: impl Into<String>) -> Self {
        self.step(Step::RawJoin { observer: observer.into(), joined: joined.into() })
    }

    /// Both actors see each other's raw join, `first` before `second`.
    pub fn mutual_join(self, first: &str, second: &str) -> Self {
        self.raw_join(first, second).raw_join(second, first)
    }

    /// `observer` sees `left` leave.
    pub fn peer_left(self, observer: impl Into<String>, left: impl Into<String>) -> Self {
        self.step(Step::PeerLeft { observer: observer.into(), left: left.into() })
    }

    /// Deliver the oldest in-flight message.
    pub fn deliver_next(self) -> Self {
        self.step(Step::DeliverNext)
    }

    /// Deliver until quiescent.
    pub fn deliver_all(self) -> Self {
        self.step(Step::DeliverAll)
    }

    /// Lose every in-flight message.
    pub fn drop_in_flight(self) -> Self {
        self.step(Step::DropInFlight)
    }

    /// Reverse the in-flight queue.
    pub fn reverse_in_flight(self) -> Self {
        self.step(Step::ReverseInFlight)
    }

    /// `actor` broadcasts a display-name update.
    pub fn send_info(self, actor: impl Into<String>, name: impl Into<String>) -> Self {
        self.step(Step::SendInfo { actor: actor.into(), name: name.into() })
    }

    /// `actor` broadcasts a ring.
    pub fn send_ring(self, actor: impl Into<String>) -> Self {
        self.step(Step::SendRing { actor: actor.into() })
    }

    /// Advance virtual time and fire timers.
    pub fn advance(self, duration: Duration) -> Self {
        self.step(Step::Advance(duration))
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Every actor joins the topic, then the steps run in order against the
    /// shared [`World`], then the oracle verifies the final state.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, seed, topic, config, actors, steps } = self.scenario;
        let env = SimEnv::with_seed(seed);
        let mut world = World::new(env.clone(), topic);

        for (actor, options) in actors {
            if world.session(&actor).is_some() {
                return Err(format!("Scenario '{name}': duplicate actor {actor}"));
            }
            world.add_peer(actor, Session::new(env.clone(), config.clone()), options);
        }

        for (index, step) in steps.into_iter().enumerate() {
            let result = match &step {
                Step::RawJoin { observer, joined } => world.raw_join(observer, joined),
                Step::PeerLeft { observer, left } => world.peer_left(observer, left),
                Step::DeliverNext => world.deliver_next().map(|_| ()),
                Step::DeliverAll => world.deliver_all().map(|_| ()),
                Step::DropInFlight => {
                    world.drop_in_flight();
                    Ok(())
                },
                Step::ReverseInFlight => {
                    world.reverse_in_flight();
                    Ok(())
                },
                Step::SendInfo { actor, name } => world.send_info(actor, name),
                Step::SendRing { actor } => world.send_ring(actor),
                Step::Advance(duration) => {
                    world.advance(*duration);
                    Ok(())
                },
            };
            result.map_err(|e| format!("Scenario '{name}': step {index} {step:?} failed: {e}"))?;
        }

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}
