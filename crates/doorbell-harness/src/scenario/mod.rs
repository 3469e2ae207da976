//! Scenario testing framework.
//!
//! Scenarios declare actors, a sequence of transport-level [`Step`]s (raw
//! joins, deliveries, drops, time) and a mandatory oracle that checks the
//! final [`World`]. Steps make the delivery order explicit, so a single
//! scenario pins down one interleaving of an otherwise unordered network.
//!
//! ```ignore
//! Scenario::new("late listener")
//!     .doorbell("door", "Front Door")
//!     .ringer("visitor")
//!     .raw_join("door", "visitor")
//!     .deliver_all()
//!     .oracle(Box::new(oracle::all_peers_known))
//!     .run()?;
//! ```

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::{Envelope, World};

/// Verification run against the final world state.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
