//! Network reachability: a point-in-time check plus change notifications.

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::{net::TcpStream, sync::watch, task::JoinHandle};
use tracing::debug;

/// Host probed by [`ProbeConnectivity`] unless told otherwise.
pub const DEFAULT_PROBE_TARGET: &str = "api.openweathermap.org:443";

#[async_trait]
pub trait ConnectivityProvider: Send + Sync + Debug {
    /// Check reachability right now.
    async fn is_connected(&self) -> bool;

    /// Receiver that is notified whenever reachability changes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Reachability reported by the embedder through [`ManualConnectivity::set`].
#[derive(Debug, Clone)]
pub struct ManualConnectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl ManualConnectivity {
    pub fn new(connected: bool) -> Self {
        let (tx, _rx) = watch::channel(connected);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, connected: bool) {
        publish(&self.tx, connected);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl ConnectivityProvider for ManualConnectivity {
    async fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Reachability measured by opening a TCP connection to `target`.
///
/// Subscribers only see changes once [`ProbeConnectivity::spawn`] has started the
/// background poller, or when [`ConnectivityProvider::is_connected`] is called.
#[derive(Debug)]
pub struct ProbeConnectivity {
    target: String,
    timeout: Duration,
    tx: Arc<watch::Sender<bool>>,
    poller: Option<JoinHandle<()>>,
}

impl ProbeConnectivity {
    pub fn new(target: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(true);
        Self {
            target: target.into(),
            timeout: Duration::from_secs(3),
            tx: Arc::new(tx),
            poller: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start polling every `every`. Replaces a previously started poller.
    pub fn spawn(&mut self, every: Duration) {
        let target = self.target.clone();
        let timeout = self.timeout;
        let tx = Arc::clone(&self.tx);

        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let connected = probe(&target, timeout).await;
                publish(&tx, connected);
            }
        });

        if let Some(previous) = self.poller.replace(poller) {
            previous.abort();
        }
    }
}

impl Default for ProbeConnectivity {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TARGET)
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

#[async_trait]
impl ConnectivityProvider for ProbeConnectivity {
    async fn is_connected(&self) -> bool {
        let connected = probe(&self.target, self.timeout).await;
        publish(&self.tx, connected);
        connected
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

async fn probe(target: &str, timeout: Duration) -> bool {
    let connected = matches!(
        tokio::time::timeout(timeout, TcpStream::connect(target)).await,
        Ok(Ok(_))
    );
    debug!(probe_target = target, connected, "connectivity probe");
    connected
}

/// Store `connected`, waking subscribers only on an actual change.
fn publish(tx: &watch::Sender<bool>, connected: bool) {
    tx.send_if_modified(|current| {
        if *current == connected {
            return false;
        }
        *current = connected;
        true
    });
}
