//! Application layer for the doorbell session protocol
//!
//! Binds the pure [`doorbell_core::Session`] state machine to a concrete
//! transport and environment. The same runtime drives production and
//! deterministic simulation; only the [`Transport`](doorbell_core::Transport)
//! and [`Environment`](doorbell_core::Environment) implementations differ.
//!
//! # Components
//!
//! - [`Runtime`]: executes session actions, owns the active channel, drives
//!   the join-ready timer
//! - [`SessionObserver`]: notification callbacks for the UI layer
//! - [`SystemEnv`]: wall clock, OS RNG and tokio timers

mod observer;
mod runtime;
mod system_env;

pub use observer::{NoopObserver, SessionObserver};
pub use runtime::{Runtime, SessionStatus};
pub use system_env::SystemEnv;
