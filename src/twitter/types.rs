//! Twitter API v1.1 types used by the relay.

use serde::Deserialize;
use serde_json::Value;

use crate::error::RelayResult;

/// Author of a status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    /// Handle without the leading `@`
    pub screen_name: String,
}

/// Untruncated text attached to statuses longer than the legacy limit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtendedTweet {
    pub full_text: String,
}

/// A single Twitter post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Status {
    /// Status ID as a string
    #[serde(default)]
    pub id_str: Option<String>,

    /// Posting account
    #[serde(rename = "user")]
    pub author: User,

    /// Body text in compatibility mode (possibly truncated)
    #[serde(default)]
    pub text: String,

    /// Body text in extended mode
    #[serde(default)]
    pub full_text: Option<String>,

    /// Full text of a truncated status, as delivered on the stream
    #[serde(default)]
    pub extended_tweet: Option<ExtendedTweet>,

    /// The status this one retweets, if any
    #[serde(default)]
    pub retweeted_status: Option<Box<Status>>,
}

impl Status {
    /// Builds a plain status. Mostly useful for hosts and tests.
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id_str: None,
            author: User {
                screen_name: author.into(),
            },
            text: text.into(),
            full_text: None,
            extended_tweet: None,
            retweeted_status: None,
        }
    }

    /// Attaches the status being retweeted.
    #[must_use]
    pub fn retweeting(mut self, original: Status) -> Self {
        self.retweeted_status = Some(Box::new(original));
        self
    }

    /// The most complete body text available: `extended_tweet.full_text`, then
    /// `full_text`, then `text`.
    pub fn body(&self) -> &str {
        self.extended_tweet
            .as_ref()
            .map(|ext| ext.full_text.as_str())
            .or(self.full_text.as_deref())
            .unwrap_or(&self.text)
    }
}

/// One decoded line of the user stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A new status from the followed timeline.
    Status(Box<Status>),

    /// A status was deleted.
    Delete { id: Option<String> },

    /// Some matching statuses were withheld by rate limiting.
    Limit { track: u64 },

    /// The server is closing the stream.
    Disconnect { code: u64, reason: String },

    /// Stall or other server warning.
    Warning { code: String, message: String },

    /// The friends list sent on connect.
    Friends { count: usize },

    /// A user event such as `favorite` or `follow`.
    Event(String),

    /// Anything else.
    Unknown,
}

impl StreamMessage {
    /// Decodes one stream line.
    ///
    /// # Returns
    ///
    /// - `Ok(StreamMessage)`: The recognised message, or `Unknown`
    /// - `Err(RelayError::Json)`: If the line is not JSON or a status is malformed
    pub fn parse(line: &str) -> RelayResult<Self> {
        let value: Value = serde_json::from_str(line)?;

        if value.get("text").is_some() && value.get("user").is_some() {
            let status: Status = serde_json::from_value(value)?;
            return Ok(Self::Status(Box::new(status)));
        }

        if let Some(delete) = value.get("delete") {
            let id = delete
                .get("status")
                .and_then(|s| s.get("id_str"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            return Ok(Self::Delete { id });
        }

        if let Some(limit) = value.get("limit") {
            let track = limit.get("track").and_then(|v| v.as_u64()).unwrap_or(0);
            return Ok(Self::Limit { track });
        }

        if let Some(disconnect) = value.get("disconnect") {
            let code = disconnect.get("code").and_then(|v| v.as_u64()).unwrap_or(0);
            let reason = disconnect
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            return Ok(Self::Disconnect { code, reason });
        }

        if let Some(warning) = value.get("warning") {
            let code = warning
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string();
            let message = warning
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return Ok(Self::Warning { code, message });
        }

        if let Some(friends) = value.get("friends").or_else(|| value.get("friends_str")) {
            let count = friends.as_array().map_or(0, Vec::len);
            return Ok(Self::Friends { count });
        }

        if let Some(event) = value.get("event").and_then(|v| v.as_str()) {
            return Ok(Self::Event(event.to_string()));
        }

        Ok(Self::Unknown)
    }
}
