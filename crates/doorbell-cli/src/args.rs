//! Command-line arguments.

use std::time::Duration;

use clap::Parser;
use doorbell_core::SessionConfig;

/// Doorbell protocol playground
#[derive(Debug, Clone, Parser)]
#[command(name = "doorbell", version, about)]
pub struct Args {
    /// Display name announced by the doorbell owner
    #[arg(long, default_value = "Front Door")]
    pub name: String,

    /// Secret token to use instead of generating one
    #[arg(long)]
    pub topic_token: Option<String>,

    /// Time after joining before an empty session reports ready
    #[arg(long, default_value_t = 2000)]
    pub join_timeout_ms: u64,

    /// Ring nonces remembered for de-duplication (0 disables)
    #[arg(long, default_value_t = 0)]
    pub nonce_window: usize,

    /// Seed for token generation, for reproducible topics
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Session configuration for both playground peers.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            nonce_window: self.nonce_window,
            ..SessionConfig::default()
        }
    }
}
