//! Environment abstraction for time and randomness.
//!
//! State machines never read the system clock or an RNG directly. Production
//! code supplies a real implementation; simulation supplies virtual time and
//! a seeded RNG so that every run is reproducible.

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Source of time and randomness for the protocol state machines.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic time, used for timers.
    fn now(&self) -> Instant;

    /// Wall-clock time in epoch milliseconds, used for ring timestamps.
    fn wall_clock_ms(&self) -> u64;

    /// Wait for `duration` of this environment's time.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}
