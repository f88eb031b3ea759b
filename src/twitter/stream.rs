//! Twitter user stream client.
//!
//! Opens the signed user stream, decodes newline-delimited JSON messages and
//! hands them to a [`StreamListener`]. HTTP error statuses, connect failures and
//! read stalls are reported to the listener and retried with back-off inside
//! the session, as are bodies that close before delivering a single message.
//! A body that breaks off mid-read ends the session with
//! [`RelayError::IncompleteRead`] so the caller can reopen it straight away.

use std::cmp::{max, min};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::sync::watch;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::oauth::OAuthSigner;

use super::api::sanitize_for_logging;
use super::types::{Status, StreamMessage};

const USER_STREAM_ENDPOINT: &str = "/1.1/user.json";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const NETWORK_BACKOFF_STEP: Duration = Duration::from_millis(250);
const NETWORK_BACKOFF_MAX: Duration = Duration::from_secs(16);
const HTTP_BACKOFF_START: Duration = Duration::from_secs(5);
const RATE_LIMIT_BACKOFF_START: Duration = Duration::from_secs(60);
const HTTP_BACKOFF_MAX: Duration = Duration::from_secs(320);

/// Callbacks for user stream events.
///
/// Only `on_status` is required; the rest log a warning by default.
pub trait StreamListener: Send + Sync {
    /// The stream connected and is about to deliver messages.
    fn on_connect(&self) {}

    /// A status arrived.
    fn on_status(&self, status: &Status);

    /// Twitter withheld `track` statuses because of rate limiting.
    fn on_limit(&self, track: u64) {
        warn!("Stream limit: {}", track);
    }

    /// The stream endpoint answered with a non-success HTTP status.
    fn on_error(&self, status_code: u16) {
        warn!("Stream error: {}", status_code);
    }

    /// Connecting or reading timed out.
    fn on_timeout(&self) {
        warn!("Stream timeout");
    }

    /// The server sent a stall or other warning.
    fn on_warning(&self, code: &str, message: &str) {
        warn!("Stream warning {}: {}", code, message);
    }

    /// The server is closing the stream for good.
    fn on_disconnect(&self, code: u64, reason: &str) {
        warn!("Stream disconnect {}: {}", code, reason);
    }
}

/// How a session ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested.
    Stopped,
    /// The server sent a disconnect message.
    Disconnected { code: u64, reason: String },
}

enum ReadEnd {
    Stopped,
    Stalled,
    /// The body ended or failed before any message arrived.
    Empty(String),
    Disconnected { code: u64, reason: String },
}

/// Back-off between reconnect attempts inside a session.
#[derive(Debug, Default)]
struct Backoff {
    network: Duration,
    http: Option<Duration>,
}

impl Backoff {
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Linear back-off for connect failures.
    fn network_error(&mut self) -> Duration {
        self.network = min(self.network + NETWORK_BACKOFF_STEP, NETWORK_BACKOFF_MAX);
        self.network
    }

    /// Exponential back-off for HTTP errors, starting higher when rate limited.
    fn http_error(&mut self, status: u16) -> Duration {
        let next = match self.http {
            Some(previous) => min(previous * 2, HTTP_BACKOFF_MAX),
            None => HTTP_BACKOFF_START,
        };
        let next = if status == 420 || status == 429 {
            max(next, RATE_LIMIT_BACKOFF_START)
        } else {
            next
        };
        self.http = Some(next);
        next
    }
}

/// Signed connection to the user stream.
#[derive(Debug, Clone)]
pub struct UserStream {
    client: Client,
    url: String,
    signer: OAuthSigner,
    read_timeout: Duration,
}

impl UserStream {
    /// Creates a stream client from the relay configuration.
    pub fn new(config: &RelayConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("twitrelay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}{}", config.stream_url, USER_STREAM_ENDPOINT),
            signer: OAuthSigner::new(&config.credentials),
            read_timeout: config.stream_read_timeout,
        })
    }

    /// Runs one user stream session.
    ///
    /// Connect failures, HTTP error statuses and read stalls are reported to
    /// `listener` and retried here. The session only returns when shutdown is
    /// signalled, the server disconnects, or the body breaks off mid-read.
    ///
    /// # Returns
    ///
    /// - `Ok(SessionEnd::Stopped)`: `shutdown` flipped to true (or its sender went away)
    /// - `Ok(SessionEnd::Disconnected { .. })`: The server sent a disconnect message
    /// - `Err(RelayError::IncompleteRead)`: The body ended or failed part-way through
    /// - `Err(..)`: Anything else is unrecoverable
    pub async fn session(
        &self,
        listener: &dyn StreamListener,
        shutdown: &mut watch::Receiver<bool>,
    ) -> RelayResult<SessionEnd> {
        let mut backoff = Backoff::default();

        loop {
            if *shutdown.borrow() {
                return Ok(SessionEnd::Stopped);
            }

            let params = [("stall_warnings", "true")];
            let auth_header = self.signer.sign("GET", &self.url, &params)?;

            info!("Connecting to user stream at {}", self.url);
            let request = self
                .client
                .get(&self.url)
                .query(&params)
                .header("Authorization", auth_header)
                .send();

            let response = tokio::select! {
                _ = shutdown.changed() => return Ok(SessionEnd::Stopped),
                response = request => response,
            };

            let delay = match response {
                Ok(response) if response.status().is_success() => {
                    info!("User stream connected");
                    listener.on_connect();

                    match self.read(response, listener, shutdown, &mut backoff).await? {
                        ReadEnd::Stopped => return Ok(SessionEnd::Stopped),
                        ReadEnd::Disconnected { code, reason } => {
                            return Ok(SessionEnd::Disconnected { code, reason })
                        }
                        ReadEnd::Stalled => {
                            listener.on_timeout();
                            continue;
                        }
                        ReadEnd::Empty(reason) => {
                            warn!("User stream closed before sending any data: {}", reason);
                            backoff.network_error()
                        }
                    }
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    listener.on_error(status);
                    backoff.http_error(status)
                }
                Err(e) if e.is_builder() => {
                    return Err(RelayError::Stream(format!(
                        "Cannot build stream request: {}",
                        e
                    )))
                }
                Err(e) if e.is_timeout() => {
                    listener.on_timeout();
                    backoff.network_error()
                }
                Err(e) => {
                    warn!("Failed to connect to user stream: {}", e);
                    backoff.network_error()
                }
            };

            info!("Reconnecting to user stream in {:?}", delay);
            tokio::select! {
                _ = shutdown.changed() => return Ok(SessionEnd::Stopped),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Reads the stream body line by line until it ends, stalls or is stopped.
    ///
    /// `backoff` is reset once the first message arrives.
    async fn read(
        &self,
        response: reqwest::Response,
        listener: &dyn StreamListener,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut Backoff,
    ) -> RelayResult<ReadEnd> {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut delivered = false;

        loop {
            let next = tokio::select! {
                _ = shutdown.changed() => return Ok(ReadEnd::Stopped),
                next = tokio::time::timeout(self.read_timeout, body.next()) => next,
            };

            let chunk = match next {
                Err(_) => return Ok(ReadEnd::Stalled),
                Ok(None) if !delivered => {
                    return Ok(ReadEnd::Empty("stream closed by server".to_string()))
                }
                Ok(None) => {
                    return Err(RelayError::IncompleteRead(
                        "stream closed by server".to_string(),
                    ))
                }
                Ok(Some(Err(e))) if !delivered => return Ok(ReadEnd::Empty(e.to_string())),
                Ok(Some(Err(e))) => return Err(RelayError::IncompleteRead(e.to_string())),
                Ok(Some(Ok(chunk))) => chunk,
            };

            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();

                if line.is_empty() {
                    debug!("Received keep-alive");
                    continue;
                }

                if !delivered {
                    delivered = true;
                    backoff.reset();
                }

                if let Some(end) = dispatch(line, listener) {
                    return Ok(end);
                }
            }
        }
    }
}

/// Routes one decoded line to the listener.
fn dispatch(line: &str, listener: &dyn StreamListener) -> Option<ReadEnd> {
    match StreamMessage::parse(line) {
        Ok(StreamMessage::Status(status)) => listener.on_status(&status),
        Ok(StreamMessage::Limit { track }) => listener.on_limit(track),
        Ok(StreamMessage::Warning { code, message }) => listener.on_warning(&code, &message),
        Ok(StreamMessage::Disconnect { code, reason }) => {
            listener.on_disconnect(code, &reason);
            return Some(ReadEnd::Disconnected { code, reason });
        }
        Ok(StreamMessage::Delete { id }) => debug!("Status deleted: {:?}", id),
        Ok(StreamMessage::Friends { count }) => debug!("Following {} accounts", count),
        Ok(StreamMessage::Event(name)) => debug!("Stream event: {}", name),
        Ok(StreamMessage::Unknown) => debug!(
            "Unrecognised stream message: {}",
            sanitize_for_logging(line, 200)
        ),
        Err(e) => warn!(
            "Failed to parse stream data: {} ({})",
            e,
            sanitize_for_logging(line, 200)
        ),
    }
    None
}
