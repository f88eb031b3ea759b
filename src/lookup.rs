//! Link lookups.
//!
//! When someone pastes a tweet link in a channel, fetch that status and echo it
//! back to the same channel.

use log::info;
use std::sync::Arc;

use crate::announce::Announcer;
use crate::error::RelayResult;
use crate::format::{render, FormatMode};
use crate::twitter::{mentions_twitter_link, parse_status_id, StatusSource};

/// What a lookup did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The message carried no usable status link.
    NoLink,
    /// The status was fetched and this line was sent back to the channel.
    Announced(String),
}

/// Answers pasted tweet links with the tweet's text.
pub struct LookupHandler {
    source: Arc<dyn StatusSource>,
    announcer: Announcer,
}

impl LookupHandler {
    pub fn new(source: Arc<dyn StatusSource>, announcer: Announcer) -> Self {
        Self { source, announcer }
    }

    /// Handles one inbound chat message.
    ///
    /// # Parameters
    ///
    /// - `channel`: Where the message came from, and where the reply goes
    /// - `body`: The message text
    ///
    /// # Returns
    ///
    /// - `Ok(LookupOutcome::NoLink)`: Nothing to do
    /// - `Ok(LookupOutcome::Announced(line))`: The status was echoed to `channel`
    /// - `Err(..)`: The fetch (or the announce) failed; nothing was sent
    pub async fn handle(&self, channel: &str, body: &str) -> RelayResult<LookupOutcome> {
        if !mentions_twitter_link(body) {
            return Ok(LookupOutcome::NoLink);
        }

        let Some(id) = parse_status_id(body) else {
            return Ok(LookupOutcome::NoLink);
        };
        info!("Pasted status link in {}: {}", channel, id);

        let status = self.source.get_status(&id).await?;
        let line = render(&status, FormatMode::Lookup);
        self.announcer.announce(channel, &line)?;
        Ok(LookupOutcome::Announced(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::format::strip_bold;
    use crate::tests::{MockStatusSource, RecordingHost};
    use crate::twitter::Status;

    fn handler(source: MockStatusSource, host: Arc<RecordingHost>) -> LookupHandler {
        LookupHandler::new(Arc::new(source), Announcer::new(host))
    }

    #[tokio::test]
    async fn test_lookup_replies_to_origin_channel() {
        let source = MockStatusSource::default().with("42", Status::new("bob", "line1\nline2"));
        let host = Arc::new(RecordingHost::default());
        let handler = handler(source, host.clone());

        let outcome = handler
            .handle("#chat", "see https://twitter.com/bob/status/42")
            .await
            .unwrap();

        assert!(matches!(outcome, LookupOutcome::Announced(_)));
        assert_eq!(
            host.sent_plain(),
            vec![("#chat".to_string(), "@bob: line1 line2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_lookup_decodes_entities_and_retweets() {
        let source = MockStatusSource::default().with(
            "7",
            Status::new("carol", "RT @dan: fish &amp; chips")
                .retweeting(Status::new("dan", "fish &amp; chips")),
        );
        let host = Arc::new(RecordingHost::default());
        let handler = handler(source, host.clone());

        let outcome = handler
            .handle("#food", "https://twitter.com/carol/status/7")
            .await
            .unwrap();

        match outcome {
            LookupOutcome::Announced(line) => {
                assert_eq!(strip_bold(&line), "@carol: RT @dan: fish & chips")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_link_does_nothing() {
        let source = MockStatusSource::default();
        let host = Arc::new(RecordingHost::default());
        let handler = handler(source.clone(), host.clone());

        for body in ["hello there", "https://twitter.com/someuser", "twitter.com/x/status/1"] {
            assert_eq!(
                handler.handle("#chat", body).await.unwrap(),
                LookupOutcome::NoLink
            );
        }
        assert!(host.sent().is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_sends_nothing() {
        let source = MockStatusSource::default();
        let host = Arc::new(RecordingHost::default());
        let handler = handler(source.clone(), host.clone());

        let err = handler
            .handle("#chat", "https://twitter.com/bob/status/404")
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Api { status: 404, .. }));
        assert_eq!(source.calls(), 1);
        assert!(host.sent().is_empty());
    }
}
