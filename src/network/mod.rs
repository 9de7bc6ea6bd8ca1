//! Network status monitor.
//!
//! Mirrors a platform connectivity signal into reactive state. The monitor is
//! informational: the coordinator keeps retrying while offline, callers
//! decide what to show.

pub mod probe;

pub use probe::{ConnectivityProbe, ProbeConfig, ProbeError};

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

/// A connectivity transition reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The platform can reach the network.
    Online,
    /// Connectivity was lost.
    Offline,
}

impl ConnectivityEvent {
    /// Maps a reachability flag to its event.
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        }
    }

    /// Whether this event reports connectivity.
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityEvent::Online)
    }
}

/// Reactive online/offline flag.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct NetworkStatusMonitor {
    state: Arc<watch::Sender<bool>>,
}

impl Default for NetworkStatusMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatusMonitor {
    /// Creates a monitor seeded with the platform's current flag.
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            state: Arc::new(state),
        }
    }

    /// Current connectivity.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Returns a receiver that observes every change of the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Applies a connectivity transition. Repeated events are ignored.
    pub fn handle_event(&self, event: ConnectivityEvent) {
        let online = event.is_online();
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "network status changed");
        }
    }

    /// Subscribes to a stream of transitions until the guard is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach(&self, mut events: mpsc::Receiver<ConnectivityEvent>) -> MonitorGuard {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                monitor.handle_event(event);
            }
        });
        MonitorGuard { handle }
    }
}

/// Keeps a subscription created by [`NetworkStatusMonitor::attach`] alive.
#[derive(Debug)]
pub struct MonitorGuard {
    handle: JoinHandle<()>,
}

impl MonitorGuard {
    /// Returns true while events are still being forwarded.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Ends the subscription.
    pub fn detach(self) {}
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initial_state() {
        assert!(NetworkStatusMonitor::new(true).is_online());
        assert!(!NetworkStatusMonitor::new(false).is_online());
        assert!(NetworkStatusMonitor::default().is_online());
    }

    #[test]
    fn test_handle_event_updates_flag() {
        let monitor = NetworkStatusMonitor::new(true);
        monitor.handle_event(ConnectivityEvent::Offline);
        assert!(!monitor.is_online());
        monitor.handle_event(ConnectivityEvent::Online);
        assert!(monitor.is_online());
    }

    #[test]
    fn test_clone_shares_state() {
        let monitor = NetworkStatusMonitor::new(true);
        let other = monitor.clone();
        monitor.handle_event(ConnectivityEvent::Offline);
        assert!(!other.is_online());
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes_only() {
        let monitor = NetworkStatusMonitor::new(true);
        let mut rx = monitor.subscribe();

        monitor.handle_event(ConnectivityEvent::Online);
        assert!(!rx.has_changed().unwrap());

        monitor.handle_event(ConnectivityEvent::Offline);
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_attach_forwards_events() {
        let monitor = NetworkStatusMonitor::new(true);
        let mut rx = monitor.subscribe();
        let (tx, events) = mpsc::channel(4);
        let guard = monitor.attach(events);

        tx.send(ConnectivityEvent::Offline).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("change should arrive")
            .unwrap();
        assert!(!monitor.is_online());
        assert!(guard.is_active());
    }

    #[tokio::test]
    async fn test_dropping_guard_unsubscribes() {
        let monitor = NetworkStatusMonitor::new(true);
        let (tx, events) = mpsc::channel(4);
        let guard = monitor.attach(events);
        guard.detach();

        // The forwarding task is gone, so the channel closes.
        tokio::time::timeout(Duration::from_secs(1), tx.closed())
            .await
            .expect("channel should close after detach");
        assert!(monitor.is_online());
    }
}
