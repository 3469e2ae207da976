//! Production environment.

use std::{
    future::Future,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use doorbell_core::Environment;
use rand::RngCore;

/// Real time, OS randomness and tokio timers.
///
/// Requires a tokio runtime with the time driver enabled for [`sleep`].
///
/// [`sleep`]: Environment::sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    // The one place allowed to read the system clock
    #[allow(clippy::disallowed_methods)]
    fn wall_clock_ms(&self) -> u64 {
        // A clock before 1970 reads as the epoch
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}
