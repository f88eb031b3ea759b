//! Configuration module for the relay.
//!
//! Values come from the host's configuration registry and are read once, when the
//! plugin is constructed. The registry is abstracted behind [`Registry`] so the
//! same loading code serves environment variables, tests and embedding hosts.

use log::{debug, error, info};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};

/// Prefix for environment variables read by [`EnvRegistry`].
pub const ENV_PREFIX: &str = "TWITRELAY_";

const DEFAULT_API_URL: &str = "https://api.twitter.com";
const DEFAULT_STREAM_URL: &str = "https://userstream.twitter.com";
const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STREAM_READ_TIMEOUT_SECS: u64 = 90;

/// Read access to the host's configuration registry.
pub trait Registry {
    /// Returns the raw value stored under `key`, if any.
    fn value(&self, key: &str) -> Option<String>;
}

/// Registry backed by `TWITRELAY_<KEY>` environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvRegistry;

impl Registry for EnvRegistry {
    fn value(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key.to_uppercase())).ok()
    }
}

impl Registry for HashMap<String, String> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// The four OAuth 1.0a secrets. Immutable once loaded.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &mask(&self.consumer_key))
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &mask(&self.access_token))
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}

/// Everything the relay reads from the registry.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Channel that receives statuses from the live stream
    pub announce_channel: String,
    /// OAuth 1.0a credentials for both the REST and the streaming endpoints
    pub credentials: Credentials,
    /// Base URL of the REST API
    pub api_url: String,
    /// Base URL of the user stream
    pub stream_url: String,
    /// Upper bound on a single-status lookup
    pub lookup_timeout: Duration,
    /// A session silent for this long counts as a stream timeout
    pub stream_read_timeout: Duration,
}

impl RelayConfig {
    /// Loads and validates the configuration from `registry`.
    ///
    /// # Required keys
    ///
    /// - `announce_channel`
    /// - `consumer_key`, `consumer_secret`
    /// - `access_token`, `access_token_secret`
    ///
    /// # Optional keys
    ///
    /// - `api_url` (defaults to `https://api.twitter.com`)
    /// - `stream_url` (defaults to `https://userstream.twitter.com`)
    /// - `lookup_timeout_secs` (defaults to 5)
    /// - `stream_read_timeout_secs` (defaults to 90)
    ///
    /// # Returns
    ///
    /// - `Ok(RelayConfig)`: If every required value is present and non-empty
    /// - `Err(RelayError::Config)`: Naming the first missing, empty or malformed value
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use twitrelay::RelayConfig;
    ///
    /// let mut registry = HashMap::new();
    /// for key in ["consumer_key", "consumer_secret", "access_token", "access_token_secret"] {
    ///     registry.insert(key.to_string(), "secret".to_string());
    /// }
    /// registry.insert("announce_channel".to_string(), "#tweets".to_string());
    ///
    /// let config = RelayConfig::from_registry(&registry).unwrap();
    /// assert_eq!(config.announce_channel, "#tweets");
    /// ```
    pub fn from_registry<R: Registry + ?Sized>(registry: &R) -> RelayResult<Self> {
        info!("Loading relay configuration from registry");

        let announce_channel = required(registry, "announce_channel")?;
        let credentials = Credentials {
            consumer_key: required(registry, "consumer_key")?,
            consumer_secret: required(registry, "consumer_secret")?,
            access_token: required(registry, "access_token")?,
            access_token_secret: required(registry, "access_token_secret")?,
        };
        debug!("Credentials loaded: {:?}", credentials);

        let api_url = optional(registry, "api_url")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let stream_url = optional(registry, "stream_url")
            .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let lookup_timeout = Duration::from_secs(seconds(
            registry,
            "lookup_timeout_secs",
            DEFAULT_LOOKUP_TIMEOUT_SECS,
        )?);
        let stream_read_timeout = Duration::from_secs(seconds(
            registry,
            "stream_read_timeout_secs",
            DEFAULT_STREAM_READ_TIMEOUT_SECS,
        )?);

        let config = RelayConfig {
            announce_channel,
            credentials,
            api_url,
            stream_url,
            lookup_timeout,
            stream_read_timeout,
        };

        info!(
            "Relay configuration loaded: announcing to {}, api {}, stream {}",
            config.announce_channel, config.api_url, config.stream_url
        );
        Ok(config)
    }

    /// Loads the configuration from `TWITRELAY_*` environment variables.
    pub fn from_env() -> RelayResult<Self> {
        Self::from_registry(&EnvRegistry)
    }
}

fn required<R: Registry + ?Sized>(registry: &R, key: &str) -> RelayResult<String> {
    match registry.value(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Some(_) => {
            error!("Registry value {} is empty", key);
            Err(RelayError::Config(format!("{} is empty", key)))
        }
        None => {
            error!("Registry value {} is not set", key);
            error!("Please ensure that all config values for the relay have been set");
            Err(RelayError::Config(format!("{} is not set", key)))
        }
    }
}

fn optional<R: Registry + ?Sized>(registry: &R, key: &str) -> Option<String> {
    registry
        .value(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn seconds<R: Registry + ?Sized>(registry: &R, key: &str, default: u64) -> RelayResult<u64> {
    match optional(registry, key) {
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            error!("Registry value {} is not a number: {}", key, e);
            RelayError::Config(format!("{} must be a whole number of seconds: {}", key, e))
        }),
        None => Ok(default),
    }
}

/// Masks a secret for logging, keeping at most its first four characters.
pub(crate) fn mask(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}...", prefix)
}
