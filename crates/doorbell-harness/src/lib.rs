//! Deterministic simulation harness for doorbell protocol testing.
//!
//! In-memory implementations of the Environment and Transport traits for
//! deterministic, reproducible testing of join orders, late listeners,
//! replays and timeouts.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod recording;
pub mod scenario;
pub mod sim_env;
pub mod sim_network;

pub use recording::{RecordingObserver, SharedHistory};
pub use sim_env::SimEnv;
pub use sim_network::{SimChannel, SimNetwork, SimTransport};
