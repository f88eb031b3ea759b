//! Twitter API integration module.
//!
//! This module contains the pieces that talk to Twitter: OAuth 1.0a signed REST
//! lookups, the user stream, the wire types, and link parsing for chat lines.

mod api;
mod parsing;
mod stream;
mod types;

// Re-export public API
pub use api::{ApiClient, StatusSource};
pub use parsing::{mentions_twitter_link, parse_status_id};
pub use stream::{SessionEnd, StreamListener, UserStream};
pub use types::{ExtendedTweet, Status, StreamMessage, User};

// Crate-internal re-exports
pub(crate) use api::sanitize_for_logging;
