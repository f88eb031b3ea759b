//! Stream monitor.
//!
//! Owns the single background task that keeps the user stream open and relays
//! every status it receives to the announce channel.
//!
//! State moves `Stopped -> Starting` on [`StreamMonitor::start`], `Starting ->
//! Running` once the stream connects, and back to `Stopped` on
//! [`StreamMonitor::stop`] or when the task ends by itself. The state, the
//! shutdown signal and the task handle sit behind one lock, so a stop request
//! can't race the task's own reconnect.

use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::announce::Announcer;
use crate::error::{RelayError, RelayResult};
use crate::format::{render, FormatMode};
use crate::twitter::{sanitize_for_logging, SessionEnd, Status, StreamListener, UserStream};

/// Name reported for the background task.
pub const MONITOR_TASK_NAME: &str = "twitrelay-monitor";

/// Lifecycle of the monitor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Starting,
    Running,
}

struct Shared {
    state: MonitorState,
    /// Bumped on every start so a finished task never clobbers a newer one
    generation: u64,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Relays statuses from the stream to the announce channel.
struct AnnounceListener {
    announcer: Announcer,
    channel: String,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
}

impl StreamListener for AnnounceListener {
    fn on_connect(&self) {
        let mut shared = self.shared.lock();
        if shared.generation == self.generation && shared.state == MonitorState::Starting {
            shared.state = MonitorState::Running;
            info!("{} running", MONITOR_TASK_NAME);
        }
    }

    fn on_status(&self, status: &Status) {
        debug!(
            "@{}: {}",
            status.author.screen_name,
            sanitize_for_logging(status.body(), 200)
        );

        let line = render(status, FormatMode::Stream);
        if let Err(e) = self.announcer.announce(&self.channel, &line) {
            error!("Failed to announce status to {}: {}", self.channel, e);
        }
    }
}

/// Starts, stops and reports on the stream relay task.
pub struct StreamMonitor {
    stream: Arc<UserStream>,
    announcer: Announcer,
    channel: String,
    shared: Arc<Mutex<Shared>>,
}

impl StreamMonitor {
    /// Creates a stopped monitor that will announce to `channel`.
    pub fn new(stream: UserStream, announcer: Announcer, channel: impl Into<String>) -> Self {
        Self {
            stream: Arc::new(stream),
            announcer,
            channel: channel.into(),
            shared: Arc::new(Mutex::new(Shared {
                state: MonitorState::Stopped,
                generation: 0,
                shutdown: None,
                handle: None,
            })),
        }
    }

    /// Current state.
    pub fn state(&self) -> MonitorState {
        self.shared.lock().state
    }

    /// Names of the tasks currently alive, for diagnostics.
    pub fn task_names(&self) -> Vec<String> {
        match self.state() {
            MonitorState::Stopped => Vec::new(),
            MonitorState::Starting | MonitorState::Running => vec![MONITOR_TASK_NAME.to_string()],
        }
    }

    /// Spawns the monitor task on the current Tokio runtime.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A new task was started
    /// - `Ok(false)`: A task was already starting or running; nothing changed
    /// - `Err(RelayError::Stream)`: Called outside a Tokio runtime
    pub fn start(&self) -> RelayResult<bool> {
        let mut shared = self.shared.lock();
        if shared.state != MonitorState::Stopped {
            debug!("{} already {:?}", MONITOR_TASK_NAME, shared.state);
            return Ok(false);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RelayError::Stream(format!("No async runtime: {}", e)))?;

        shared.generation += 1;
        let generation = shared.generation;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = AnnounceListener {
            announcer: self.announcer.clone(),
            channel: self.channel.clone(),
            shared: Arc::clone(&self.shared),
            generation,
        };

        let handle = runtime.spawn(run_monitor(
            Arc::clone(&self.stream),
            listener,
            shutdown_rx,
        ));

        shared.state = MonitorState::Starting;
        shared.shutdown = Some(shutdown_tx);
        shared.handle = Some(handle);
        info!("Starting {}", MONITOR_TASK_NAME);
        Ok(true)
    }

    /// Asks the task to stop at its next await point.
    ///
    /// Returns `false` (and changes nothing) if the monitor was not running.
    pub fn stop(&self) -> bool {
        self.signal_stop().is_some()
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(&self) {
        if let Some(Some(handle)) = self.signal_stop() {
            if let Err(e) = handle.await {
                error!("{} did not shut down cleanly: {}", MONITOR_TASK_NAME, e);
            }
        }
    }

    /// Flips state to `Stopped` and signals the task. `None` if already stopped.
    fn signal_stop(&self) -> Option<Option<JoinHandle<()>>> {
        let mut shared = self.shared.lock();
        if shared.state == MonitorState::Stopped {
            debug!("{} not running", MONITOR_TASK_NAME);
            return None;
        }

        if let Some(shutdown) = shared.shutdown.take() {
            shutdown.send(true).ok();
        }
        shared.state = MonitorState::Stopped;
        info!("Stopping {}", MONITOR_TASK_NAME);
        Some(shared.handle.take())
    }
}

impl Drop for StreamMonitor {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

/// Body of the monitor task: reopen the session after every partial read,
/// stop on anything else.
async fn run_monitor(
    stream: Arc<UserStream>,
    listener: AnnounceListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let outcome = loop {
        match stream.session(&listener, &mut shutdown).await {
            Err(e) if e.is_incomplete_read() => {
                debug!("{}, reopening user stream", e);
            }
            other => break other,
        }
    };

    match outcome {
        Ok(SessionEnd::Stopped) => info!("{} stopped", MONITOR_TASK_NAME),
        Ok(SessionEnd::Disconnected { code, reason }) => error!(
            "{} ended: stream disconnected by server ({}: {})",
            MONITOR_TASK_NAME, code, reason
        ),
        Err(e) => error!("{} terminated: {}", MONITOR_TASK_NAME, e),
    }

    let mut shared = listener.shared.lock();
    if shared.generation == listener.generation {
        shared.state = MonitorState::Stopped;
        shared.shutdown = None;
        shared.handle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::tests::{test_registry, wait_for, RecordingHost};
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn monitor_for(mock_server: &MockServer, host: Arc<RecordingHost>) -> StreamMonitor {
        let mut registry = test_registry();
        registry.insert("stream_url".to_string(), mock_server.uri());
        let config = RelayConfig::from_registry(&registry).unwrap();
        StreamMonitor::new(
            UserStream::new(&config).unwrap(),
            Announcer::new(host),
            config.announce_channel,
        )
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/user.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let monitor = monitor_for(&mock_server, Arc::new(RecordingHost::default()));
        assert_eq!(monitor.state(), MonitorState::Stopped);

        assert!(monitor.start().unwrap());
        assert!(!monitor.start().unwrap());
        assert_eq!(monitor.task_names(), vec![MONITOR_TASK_NAME.to_string()]);
        assert_eq!(monitor.state(), MonitorState::Starting);

        monitor.shutdown().await;
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(monitor.task_names().is_empty());
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let mock_server = MockServer::start().await;
        let monitor = monitor_for(&mock_server, Arc::new(RecordingHost::default()));

        assert!(!monitor.stop());
        assert!(!monitor.stop());
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/user.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let monitor = monitor_for(&mock_server, Arc::new(RecordingHost::default()));
        assert!(monitor.start().unwrap());
        assert!(monitor.stop());
        assert!(monitor.start().unwrap());
        assert_eq!(monitor.state(), MonitorState::Starting);

        // Give the first task time to notice its shutdown and exit; it must not
        // reset the state owned by the second one.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(monitor.state(), MonitorState::Starting);
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_disconnect_ends_task() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/user.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"disconnect\":{\"code\":6,\"reason\":\"token revoked\"}}\r\n",
            ))
            .mount(&mock_server)
            .await;

        let host = Arc::new(RecordingHost::default());
        let monitor = monitor_for(&mock_server, host.clone());
        assert!(monitor.start().unwrap());

        assert!(wait_for(|| monitor.state() == MonitorState::Stopped).await);
        assert!(host.sent().is_empty());
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let config = RelayConfig::from_registry(&test_registry()).unwrap();
        let monitor = StreamMonitor::new(
            UserStream::new(&config).unwrap(),
            Announcer::new(Arc::new(RecordingHost::default())),
            "#tweets",
        );
        assert!(monitor.start().is_err());
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[test]
    fn test_connect_moves_starting_to_running() {
        let shared = Arc::new(Mutex::new(Shared {
            state: MonitorState::Starting,
            generation: 3,
            shutdown: None,
            handle: None,
        }));
        let host = Arc::new(RecordingHost::default());

        let stale = AnnounceListener {
            announcer: Announcer::new(host.clone()),
            channel: "#tweets".to_string(),
            shared: Arc::clone(&shared),
            generation: 2,
        };
        stale.on_connect();
        assert_eq!(shared.lock().state, MonitorState::Starting);

        let current = AnnounceListener {
            announcer: Announcer::new(host),
            channel: "#tweets".to_string(),
            shared: Arc::clone(&shared),
            generation: 3,
        };
        current.on_connect();
        assert_eq!(shared.lock().state, MonitorState::Running);
    }

    #[test]
    fn test_announce_failure_does_not_panic() {
        let shared = Arc::new(Mutex::new(Shared {
            state: MonitorState::Running,
            generation: 1,
            shutdown: None,
            handle: None,
        }));
        let host = Arc::new(RecordingHost::default());
        let listener = AnnounceListener {
            announcer: Announcer::new(host.clone()),
            channel: String::new(),
            shared,
            generation: 1,
        };

        listener.on_status(&Status::new("alice", "hello"));
        assert!(host.sent().is_empty());
    }
}
