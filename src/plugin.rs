//! The plugin surface the host registers.
//!
//! [`Plugin`] is the small capability interface a bot host drives: lifecycle
//! commands, diagnostics and inbound chat messages. [`TwitRelay`] wires the
//! stream monitor and the link lookup handler behind it.

use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use crate::announce::{Announcer, IrcHost};
use crate::config::{RelayConfig, Registry};
use crate::error::RelayResult;
use crate::lookup::{LookupHandler, LookupOutcome};
use crate::monitor::{MonitorState, StreamMonitor};
use crate::twitter::{sanitize_for_logging, ApiClient, StatusSource, UserStream};

/// Capabilities a bot host calls on a plugin.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name as shown to operators.
    fn name(&self) -> &str;

    /// `start` command. Idempotent.
    fn start(&self) -> RelayResult<()>;

    /// `stop` command. Idempotent.
    fn stop(&self);

    /// `status` command: names of the tasks currently running.
    fn status(&self) -> Vec<String>;

    /// Called for every chat message the host receives.
    async fn on_message(&self, channel: &str, body: &str);

    /// Called once when the host unloads the plugin.
    async fn die(&self);
}

/// Relays the configured user stream and unfurls pasted tweet links.
pub struct TwitRelay {
    config: RelayConfig,
    monitor: StreamMonitor,
    lookup: LookupHandler,
}

impl TwitRelay {
    /// Plugin name.
    pub const NAME: &'static str = "TwitRelay";

    /// Builds the plugin from the host's registry.
    ///
    /// # Returns
    ///
    /// - `Ok(TwitRelay)`: Ready to `start`
    /// - `Err(RelayError::Config)`: A required value is missing or empty; the
    ///   plugin must not be activated and the error should be shown to the operator
    pub fn new<R: Registry + ?Sized>(registry: &R, host: Arc<dyn IrcHost>) -> RelayResult<Self> {
        let config = RelayConfig::from_registry(registry)?;
        let api: Arc<dyn StatusSource> = Arc::new(ApiClient::new(&config)?);
        Self::with_source(config, api, host)
    }

    /// Builds the plugin with an explicit status source for lookups.
    pub fn with_source(
        config: RelayConfig,
        source: Arc<dyn StatusSource>,
        host: Arc<dyn IrcHost>,
    ) -> RelayResult<Self> {
        let announcer = Announcer::new(host);
        let monitor = StreamMonitor::new(
            UserStream::new(&config)?,
            announcer.clone(),
            config.announce_channel.clone(),
        );
        let lookup = LookupHandler::new(source, announcer);

        info!(
            "{} ready, announcing to {}",
            Self::NAME,
            config.announce_channel
        );
        Ok(Self {
            config,
            monitor,
            lookup,
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Current monitor state.
    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }
}

#[async_trait]
impl Plugin for TwitRelay {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn start(&self) -> RelayResult<()> {
        self.monitor.start().map(|_| ())
    }

    fn stop(&self) {
        self.monitor.stop();
    }

    fn status(&self) -> Vec<String> {
        let names = self.monitor.task_names();
        info!("Running tasks: [{}]", names.join(", "));
        names
    }

    async fn on_message(&self, channel: &str, body: &str) {
        // Lookup failures are not reported back to the channel.
        if let Ok(LookupOutcome::Announced(line)) = self.lookup.handle(channel, body).await {
            debug!(
                "Answered link in {}: {}",
                channel,
                sanitize_for_logging(&line, 200)
            );
        }
    }

    async fn die(&self) {
        self.monitor.shutdown().await;
    }
}
