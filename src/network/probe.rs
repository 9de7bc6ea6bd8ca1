//! Connectivity probe for native hosts.
//!
//! Periodically sends a `HEAD` request to a configured URL and reports
//! transitions between reachable and unreachable through a channel. Any HTTP
//! response, whatever its status, counts as reachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use super::ConnectivityEvent;

/// Errors raised while setting up a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe URL could not be parsed.
    #[error("invalid probe url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be built.
    #[error("failed to build probe client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Configuration for a [`ConnectivityProbe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// URL to send `HEAD` requests to.
    pub url: String,
    /// Time between checks.
    /// Default: 30 seconds
    pub interval: Duration,
    /// Time limit for a single check.
    /// Default: 5 seconds
    pub request_timeout: Duration,
}

impl ProbeConfig {
    /// Checks `url` with the default interval and timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Time between checks.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Time limit for a single check.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Background task producing [`ConnectivityEvent`]s from periodic checks.
pub struct ConnectivityProbe {
    config: ProbeConfig,
    client: reqwest::Client,
    url: reqwest::Url,
    sender: mpsc::Sender<ConnectivityEvent>,
    stop_flag: Arc<AtomicBool>,
    task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConnectivityProbe {
    /// Creates a probe and the receiver its events arrive on.
    pub fn new(
        config: ProbeConfig,
    ) -> Result<(Self, mpsc::Receiver<ConnectivityEvent>), ProbeError> {
        let url = reqwest::Url::parse(&config.url).map_err(|e| ProbeError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .no_proxy()
            .build()?;
        let (sender, receiver) = mpsc::channel(16);

        let probe = Self {
            config,
            client,
            url,
            sender,
            stop_flag: Arc::new(AtomicBool::new(false)),
            task_handle: Arc::new(Mutex::new(None)),
        };

        Ok((probe, receiver))
    }

    /// Returns the probe configuration.
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Performs a single reachability check.
    pub async fn check(&self) -> bool {
        reachable(&self.client, &self.url).await
    }

    /// Starts periodic checks, emitting an event on every transition away
    /// from `last_known`.
    ///
    /// The task ends on [`stop`](Self::stop) or once the receiver is dropped.
    pub async fn start(&self, last_known: bool) {
        self.stop_flag.store(false, Ordering::SeqCst);

        let client = self.client.clone();
        let url = self.url.clone();
        let interval = self.config.interval;
        let sender = self.sender.clone();
        let stop_flag = Arc::clone(&self.stop_flag);

        let handle = tokio::spawn(async move {
            let mut online = last_known;
            loop {
                if stop_flag.load(Ordering::SeqCst) || sender.is_closed() {
                    break;
                }

                let now_online = reachable(&client, &url).await;
                if now_online != online {
                    online = now_online;
                    let event = ConnectivityEvent::from_online(online);
                    debug!(%url, ?event, "connectivity changed");
                    if sender.send(event).await.is_err() {
                        break;
                    }
                }

                tokio::time::sleep(interval).await;
            }
        });

        let mut task = self.task_handle.lock().await;
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Stops the background task and waits for it to finish.
    pub async fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        let handle = {
            let mut task = self.task_handle.lock().await;
            task.take()
        };

        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Returns true if the background task is running.
    pub async fn is_running(&self) -> bool {
        let task = self.task_handle.lock().await;
        task.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

async fn reachable(client: &reqwest::Client, url: &reqwest::Url) -> bool {
    client.head(url.clone()).send().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `200 OK` to every connection.
    async fn spawn_ok_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                        .await;
                });
            }
        });
        format!("http://{addr}/health")
    }

    /// Returns a URL on a port nothing listens on.
    async fn closed_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/health")
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = ConnectivityProbe::new(ProbeConfig::new("not a url"));
        assert!(matches!(result, Err(ProbeError::InvalidUrl { .. })));
    }

    #[test]
    fn test_config_builder() {
        let config = ProbeConfig::new("http://localhost/health")
            .with_interval(Duration::from_secs(5))
            .with_request_timeout(Duration::from_secs(1));
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_check_reachable_server() {
        let url = spawn_ok_server().await;
        let (probe, _receiver) = ConnectivityProbe::new(ProbeConfig::new(url)).unwrap();
        assert!(probe.check().await);
    }

    #[tokio::test]
    async fn test_check_unreachable_server() {
        let url = closed_url().await;
        let config = ProbeConfig::new(url).with_request_timeout(Duration::from_secs(2));
        let (probe, _receiver) = ConnectivityProbe::new(config).unwrap();
        assert!(!probe.check().await);
    }

    #[tokio::test]
    async fn test_emits_transition_only() {
        let url = closed_url().await;
        let config = ProbeConfig::new(url)
            .with_interval(Duration::from_millis(20))
            .with_request_timeout(Duration::from_secs(2));
        let (probe, mut receiver) = ConnectivityProbe::new(config).unwrap();

        probe.start(true).await;
        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("probe should report within timeout");
        assert_eq!(event, Some(ConnectivityEvent::Offline));

        // Still offline: no further events.
        let again = tokio::time::timeout(Duration::from_millis(150), receiver.recv()).await;
        assert!(again.is_err());

        probe.stop().await;
        assert!(!probe.is_running().await);
    }
}
