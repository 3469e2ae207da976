//! Local playground for the doorbell session protocol.
//!
//! Runs a doorbell owner and a ringer in one process, connected through the
//! in-memory network, and drives them with slash-commands.

pub mod args;
pub mod commands;
pub mod playground;

pub use args::Args;
pub use commands::{Command, parse};
pub use playground::{Playground, PlaygroundError};
