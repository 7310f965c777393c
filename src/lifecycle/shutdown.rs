//! Shutdown coordination for the gateway.

use tokio::sync::broadcast;

/// Fans one shutdown signal out to the gateway listener, the admin
/// listener and anything else serving until exit.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of listeners still waiting to drain.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Resolves once the signal arrives, or when the coordinator is dropped.
pub async fn wait(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
