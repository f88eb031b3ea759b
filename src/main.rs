//! # TwitRelay console host
//!
//! Runs the relay plugin without an IRC connection, which is handy for checking
//! credentials and formatting. Outbound messages are printed as raw
//! `PRIVMSG <target> :<text>` lines and inbound chat is read from stdin.
//!
//! ## Input
//!
//! - `!start`, `!stop`, `!status`: The plugin commands
//! - `!quit`: Stop the monitor and exit
//! - `<#channel> <message>`: Deliver `message` as if it was said in `#channel`
//!
//! ## Environment Variables
//!
//! - `TWITRELAY_ANNOUNCE_CHANNEL`, `TWITRELAY_CONSUMER_KEY`, `TWITRELAY_CONSUMER_SECRET`,
//!   `TWITRELAY_ACCESS_TOKEN`, `TWITRELAY_ACCESS_TOKEN_SECRET`: Required
//! - `RUST_LOG`: Log level (e.g. `RUST_LOG=debug`)
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```

use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use twitrelay::{EnvRegistry, IrcHost, Plugin, RelayResult, TwitRelay};

/// Host that writes outbound messages to stdout.
struct StdoutHost;

impl IrcHost for StdoutHost {
    fn queue_privmsg(&self, target: &str, text: &str) -> RelayResult<()> {
        println!("PRIVMSG {} :{}", target, text);
        Ok(())
    }
}

/// Handles one stdin line. Returns `false` when the host should exit.
async fn handle_line(relay: &TwitRelay, line: &str) -> bool {
    match line.trim() {
        "" => {}
        "!quit" => return false,
        "!start" => {
            if let Err(e) = relay.start() {
                error!("Failed to start: {}", e);
            }
        }
        "!stop" => relay.stop(),
        "!status" => println!("running: [{}]", relay.status().join(", ")),
        input => match input.split_once(' ') {
            Some((channel, message)) if channel.starts_with('#') => {
                relay.on_message(channel, message).await;
            }
            _ => warn!("Expected '<#channel> <message>', got: {}", input),
        },
    }
    true
}

#[tokio::main]
async fn main() {
    // Initialize the logging system
    env_logger::init();

    let relay = match TwitRelay::new(&EnvRegistry, Arc::new(StdoutHost)) {
        Ok(relay) => relay,
        Err(e) => {
            error!("Failed to initialise {}: {}", TwitRelay::NAME, e);
            eprintln!(
                "Please ensure that all config values for {} have been set: {}",
                TwitRelay::NAME,
                e
            );
            std::process::exit(1);
        }
    };

    info!("{} console host ready", relay.name());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&relay, &line).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    relay.die().await;
    info!("{} stopped", relay.name());
}
