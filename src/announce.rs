//! Outbound messages.
//!
//! The host owns the IRC connection; the relay only ever asks it to queue a
//! PRIVMSG. [`Announcer`] is the single place that does so.

use log::debug;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::twitter::sanitize_for_logging;

/// The host's message-send primitive.
pub trait IrcHost: Send + Sync {
    /// Queues a PRIVMSG to `target`.
    ///
    /// Returns an error only if the message could not be queued at all;
    /// delivery after that is the host's concern.
    fn queue_privmsg(&self, target: &str, text: &str) -> RelayResult<()>;
}

/// Sends formatted lines to channels through the host.
#[derive(Clone)]
pub struct Announcer {
    host: Arc<dyn IrcHost>,
}

impl Announcer {
    pub fn new(host: Arc<dyn IrcHost>) -> Self {
        Self { host }
    }

    /// Enqueues `line` for delivery to `channel`. Nothing is retried.
    pub fn announce(&self, channel: &str, line: &str) -> RelayResult<()> {
        if channel.trim().is_empty() {
            return Err(RelayError::Host("no target channel".to_string()));
        }
        debug!("{} <- {}", channel, sanitize_for_logging(line, 200));
        self.host.queue_privmsg(channel, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    impl IrcHost for Outbox {
        fn queue_privmsg(&self, target: &str, text: &str) -> RelayResult<()> {
            self.0.lock().push((target.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_announce_queues_privmsg() {
        let outbox = Arc::new(Outbox::default());
        let announcer = Announcer::new(outbox.clone());

        announcer.announce("#tweets", "@alice: hello").unwrap();
        announcer.announce("#other", "@bob: hi").unwrap();

        assert_eq!(
            *outbox.0.lock(),
            vec![
                ("#tweets".to_string(), "@alice: hello".to_string()),
                ("#other".to_string(), "@bob: hi".to_string()),
            ]
        );
    }

    #[test]
    fn test_announce_without_channel_fails() {
        let outbox = Arc::new(Outbox::default());
        let announcer = Announcer::new(outbox.clone());

        assert!(matches!(
            announcer.announce(" ", "@alice: hello"),
            Err(RelayError::Host(_))
        ));
        assert!(outbox.0.lock().is_empty());
    }
}
