//! Error types for the relay.
//!
//! Every fallible boundary (configuration, OAuth signing, HTTP, JSON decoding,
//! the streaming session) reports through [`RelayError`] so callers decide
//! explicitly whether to propagate or drop a failure.

use thiserror::Error;

/// Errors produced by the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A required registry value is missing, empty or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// OAuth signature generation failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Twitter API returned a non-success status
    #[error("Twitter API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The stream body ended or failed part-way through a read
    #[error("Incomplete read: {0}")]
    IncompleteRead(String),

    /// Unrecoverable streaming failure
    #[error("Stream error: {0}")]
    Stream(String),

    /// The host refused to queue an outbound message
    #[error("Host error: {0}")]
    Host(String),

    /// A single-status fetch did not complete in time
    #[error("Request timed out")]
    Timeout,
}

impl RelayError {
    /// True for partial reads, which the monitor recovers from by reopening
    /// the session straight away.
    #[must_use]
    pub const fn is_incomplete_read(&self) -> bool {
        matches!(self, Self::IncompleteRead(_))
    }

    /// True for errors raised while loading configuration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
