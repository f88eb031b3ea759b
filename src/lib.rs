//! # TwitRelay Library
//!
//! An IRC bot plugin that relays Twitter statuses into a channel.
//!
//! ## Features
//!
//! - Relays every status from the authenticated user stream to a fixed announce channel
//! - Echoes the tweet behind any Twitter status link pasted into a channel
//! - OAuth 1.0a signed requests for both the stream and REST lookups
//! - Structured logging
//!
//! ## Configuration
//!
//! Read once from the host's registry (or `TWITRELAY_*` environment variables):
//! - `announce_channel`: Channel that receives statuses from the stream
//! - `consumer_key`, `consumer_secret`: OAuth 1.0a consumer credentials
//! - `access_token`, `access_token_secret`: OAuth 1.0a access credentials
//!
//! ## Commands
//!
//! - `start`: Start relaying the stream (no-op if already running)
//! - `stop`: Stop relaying the stream (no-op if not running)
//! - `status`: Report running task names

pub mod announce;
pub mod config;
pub mod error;
pub mod format;
pub mod lookup;
pub mod monitor;
pub mod oauth;
pub mod plugin;
pub mod twitter;

// Re-export commonly used types and functions
pub use announce::{Announcer, IrcHost};
pub use config::{Credentials, EnvRegistry, Registry, RelayConfig};
pub use error::{RelayError, RelayResult};
pub use format::{format_status, render, unencode, FormatMode};
pub use lookup::{LookupHandler, LookupOutcome};
pub use monitor::{MonitorState, StreamMonitor, MONITOR_TASK_NAME};
pub use plugin::{Plugin, TwitRelay};
pub use twitter::{parse_status_id, Status, StatusSource};
