//! Core Twitter REST utilities.
//!
//! This module holds the signed REST client used for single-status lookups and
//! the [`StatusSource`] seam the lookup handler depends on.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::oauth::OAuthSigner;

use super::types::Status;

/// Sanitizes text for safe logging by truncating and escaping control characters.
///
/// This function:
/// - Truncates long text to prevent log flooding
/// - Replaces control characters that could manipulate log output
/// - Escapes newlines to prevent log injection
///
/// # Parameters
///
/// - `text`: The text to sanitize
/// - `max_len`: Maximum number of characters before truncation
///
/// # Returns
///
/// A sanitized string safe for logging
pub(crate) fn sanitize_for_logging(text: &str, max_len: usize) -> String {
    let sanitized: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_control() => '?',
            c => c,
        })
        .collect();

    if sanitized.chars().count() > max_len {
        let head: String = sanitized.chars().take(max_len).collect();
        format!("{}... [truncated, {} total bytes]", head, text.len())
    } else {
        sanitized
    }
}

/// Anything that can fetch a single status by ID.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetches the status with the given ID.
    async fn get_status(&self, id: &str) -> RelayResult<Status>;
}

/// Signed client for the Twitter REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    signer: OAuthSigner,
}

impl ApiClient {
    /// Creates a client from the relay configuration.
    ///
    /// Every request is bounded by `config.lookup_timeout`.
    pub fn new(config: &RelayConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(config.lookup_timeout)
            .user_agent(concat!("twitrelay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            signer: OAuthSigner::new(&config.credentials),
        })
    }

    /// Sends a signed GET request and returns the response body.
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Path below the base URL, e.g. `/1.1/statuses/show.json`
    /// - `params`: Query parameters (also covered by the signature)
    /// - `operation_name`: Human-readable name for the operation (for logging)
    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        operation_name: &str,
    ) -> RelayResult<String> {
        let url = format!("{}{}", self.base_url, endpoint);
        let auth_header = self.signer.sign("GET", &url, params)?;

        debug!("Request URL: {} params: {:?}", url, params);
        let response = self
            .client
            .get(&url)
            .query(params)
            .header("Authorization", auth_header)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout
                } else {
                    RelayError::Http(e)
                }
            })?;

        let status = response.status();
        info!(
            "Received response with status: {} for operation: {}",
            status, operation_name
        );

        let body = response.text().await?;
        if status.is_success() {
            debug!(
                "Response summary for '{}': {} bytes received",
                operation_name,
                body.len()
            );
            return Ok(body);
        }

        // Callers decide whether a failed lookup is worth reporting.
        debug!(
            "Operation '{}' failed - Status: {} - {}",
            operation_name,
            status,
            sanitize_for_logging(&body, 200)
        );
        Err(RelayError::Api {
            status: status.as_u16(),
            message: api_error_message(&body),
        })
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    /// Looks up a status with `GET /1.1/statuses/show.json` in extended mode.
    async fn get_status(&self, id: &str) -> RelayResult<Status> {
        info!("Looking up status {}", id);
        let body = self
            .get(
                "/1.1/statuses/show.json",
                &[("id", id), ("tweet_mode", "extended")],
                "get_status",
            )
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pulls the first message out of a v1.1 `{"errors":[{"message":...}]}` body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| sanitize_for_logging(body, 200))
}
