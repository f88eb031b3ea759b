//! Text parsing and extraction utilities for chat lines.
//!
//! This module finds pasted Twitter status links in IRC messages and pulls the
//! status ID out of them.

use url::Url;

/// Substrings that mark a token as a Twitter link.
const TWITTER_HOSTS: [&str; 3] = ["//twitter.com/", "//mobile.twitter.com/", "//x.com/"];

/// Returns true if `text` contains anything that looks like a Twitter link.
///
/// This is the cheap check run on every inbound message before any parsing.
pub fn mentions_twitter_link(text: &str) -> bool {
    TWITTER_HOSTS.iter().any(|host| text.contains(host))
}

/// Extracts the status ID from the first Twitter link in a chat message.
///
/// The message is split on whitespace and only the first token containing a
/// Twitter host is considered; later links in the same message are ignored.
/// That token is parsed as a URL, empty path segments are dropped, and the
/// segment following `status` (or `statuses`) is returned.
///
/// # Parameters
///
/// - `message`: The chat message body
///
/// # Returns
///
/// - `Some(id)`: The status ID from the first Twitter link
/// - `None`: If there is no Twitter link, or the first one is not a status link
///
/// # Example
///
/// ```rust
/// use twitrelay::parse_status_id;
///
/// assert_eq!(
///     parse_status_id("check this https://twitter.com/someuser/status/123456789 out"),
///     Some("123456789".to_string())
/// );
/// assert_eq!(parse_status_id("https://twitter.com/someuser"), None);
/// ```
pub fn parse_status_id(message: &str) -> Option<String> {
    let token = message
        .split_whitespace()
        .find(|word| mentions_twitter_link(word))?;

    let url = parse_link(token)?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let marker = segments
        .iter()
        .position(|s| *s == "status" || *s == "statuses")?;
    segments.get(marker + 1).map(|id| id.to_string())
}

/// Parses a token as a URL, accepting scheme-relative `//host/...` links.
fn parse_link(token: &str) -> Option<Url> {
    if token.starts_with("//") {
        Url::parse(&format!("https:{}", token)).ok()
    } else {
        Url::parse(token).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_id() {
        assert_eq!(
            parse_status_id("check this https://twitter.com/someuser/status/123456789 out"),
            Some("123456789".to_string())
        );

        // Trailing slash, query and fragment
        assert_eq!(
            parse_status_id("https://twitter.com/someuser/status/987/?s=20#frag"),
            Some("987".to_string())
        );

        // Legacy hash-bang style with doubled slashes
        assert_eq!(
            parse_status_id("http://twitter.com//bob//statuses//55"),
            Some("55".to_string())
        );

        // Other hosts
        assert_eq!(
            parse_status_id("https://x.com/bob/status/7"),
            Some("7".to_string())
        );
        assert_eq!(
            parse_status_id("//mobile.twitter.com/bob/status/8"),
            Some("8".to_string())
        );
    }

    #[test]
    fn test_parse_status_id_not_found() {
        assert_eq!(parse_status_id("no links here"), None);
        assert_eq!(parse_status_id(""), None);
        assert_eq!(parse_status_id("https://twitter.com/someuser"), None);
        assert_eq!(parse_status_id("https://twitter.com/someuser/status"), None);
        assert_eq!(parse_status_id("https://example.com/bob/status/1"), None);
    }

    #[test]
    fn test_only_first_link_counts() {
        assert_eq!(
            parse_status_id("https://twitter.com/a/status/1 https://twitter.com/b/status/2"),
            Some("1".to_string())
        );

        // The first Twitter token is not a status link, so the second is never tried
        assert_eq!(
            parse_status_id("https://twitter.com/a https://twitter.com/b/status/2"),
            None
        );
    }

    #[test]
    fn test_mentions_twitter_link() {
        assert!(mentions_twitter_link("see https://twitter.com/bob/status/42"));
        assert!(!mentions_twitter_link("see twitter.com/bob"));
    }
}
