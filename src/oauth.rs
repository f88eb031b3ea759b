//! OAuth authentication module for Twitter API integration.
//!
//! Both the user stream and the status lookup endpoint authenticate with
//! OAuth 1.0a user-context signatures built from the four configured
//! credentials.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Credentials;
use crate::error::{RelayError, RelayResult};

type HmacSha1 = Hmac<Sha1>;

/// OAuth 1.0a signer for Twitter API requests.
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: Credentials,
}

impl OAuthSigner {
    /// Creates a signer for the given credentials.
    #[must_use]
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            credentials: credentials.clone(),
        }
    }

    /// Builds the Authorization header for a request.
    ///
    /// # Parameters
    ///
    /// - `method`: HTTP method (GET, POST, ...)
    /// - `url`: The request URL without its query string
    /// - `params`: Query parameters sent with the request
    ///
    /// # Returns
    ///
    /// A header value of the form `OAuth oauth_consumer_key="...", ...`.
    pub fn sign(&self, method: &str, url: &str, params: &[(&str, &str)]) -> RelayResult<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RelayError::OAuth(format!("Failed to get timestamp: {}", e)))?
            .as_secs()
            .to_string();

        self.sign_with(method, url, params, &generate_nonce(), &timestamp)
    }

    fn sign_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> RelayResult<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.credentials.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut all_params: Vec<(String, String)> = oauth_params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        all_params.extend(
            params
                .iter()
                .map(|(k, v)| (percent_encode(k), percent_encode(v))),
        );
        all_params.sort();

        let param_string = all_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(url),
            percent_encode(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.credentials.consumer_secret),
            percent_encode(&self.credentials.access_token_secret)
        );

        let signature = hmac_sha1(&signing_key, &base_string)?;
        oauth_params.push(("oauth_signature", signature.as_str()));

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", header))
    }
}

/// Percent-encodes a string with the RFC 3986 unreserved set.
fn percent_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hmac_sha1(key: &str, data: &str) -> RelayResult<String> {
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| RelayError::OAuth(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        // Credentials from Twitter's "Creating a signature" walkthrough.
        Credentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".into(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".into(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
            access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".into(),
        }
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("hello world"), "hello%20world");
        assert_eq!(percent_encode("foo=bar&baz"), "foo%3Dbar%26baz");
        assert_eq!(percent_encode("test-value_123.txt"), "test-value_123.txt");
        assert_eq!(percent_encode("~tilde"), "~tilde");
    }

    #[test]
    fn test_generate_nonce() {
        let nonce1 = generate_nonce();
        let nonce2 = generate_nonce();
        assert_ne!(nonce1, nonce2);
        assert_eq!(nonce1.len(), 32);
        assert!(nonce1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_matches_reference() {
        let signer = OAuthSigner::new(&credentials());
        let header = signer
            .sign_with(
                "post",
                "https://api.twitter.com/1.1/statuses/update.json",
                &[
                    ("include_entities", "true"),
                    (
                        "status",
                        "Hello Ladies + Gentlemen, a signed OAuth request!",
                    ),
                ],
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
                "1318622958",
            )
            .unwrap();

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
    }

    #[test]
    fn test_sign_includes_oauth_fields() {
        let signer = OAuthSigner::new(&credentials());
        let header = signer
            .sign("GET", "https://userstream.twitter.com/1.1/user.json", &[])
            .unwrap();
        assert!(header.contains("oauth_timestamp="));
        assert!(header.contains("oauth_nonce="));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
    }
}
