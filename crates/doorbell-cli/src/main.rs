//! `doorbell` binary: interactive protocol playground.

use std::{io::Write, time::Duration};

use clap::Parser;
use doorbell_cli::{Args, Command, Playground, PlaygroundError, commands::Side, parse};
use doorbell_core::topic::is_valid_token;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// How often timers and queued events are processed while idle.
const PUMP_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), PlaygroundError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if let Some(token) = args.topic_token.as_deref().filter(|t| !is_valid_token(t)) {
        warn!(token, "token does not look like a generated token; using it anyway");
    }

    let mut playground =
        Playground::new(args.name.clone(), args.topic_token.clone(), args.seed, &args.session_config());
    let mut out = std::io::stdout();
    playground.execute(Command::Help).await?;
    playground.flush(&mut out)?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(PUMP_INTERVAL);

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match playground.execute(parse(&line)).await {
                    Ok(true) => playground.pump(),
                    Ok(false) => break,
                    Err(error) => writeln!(out, "error: {error}")?,
                }
            },
            _ = ticker.tick() => playground.pump(),
        }
        playground.flush(&mut out)?;
    }

    playground.execute(Command::Leave { side: Side::Visitor }).await?;
    playground.execute(Command::Leave { side: Side::Door }).await?;
    playground.flush(&mut out)?;
    Ok(())
}
