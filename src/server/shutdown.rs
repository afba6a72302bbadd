//! Process-wide cancellation.

use std::sync::Arc;
use tokio::sync::watch;

/// Owner side of the shutdown signal.
///
/// Every long-running task holds a [`ShutdownListener`] and races it
/// against its next suspension point.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolves once shutdown has been triggered, immediately if it
    /// already was. Never resolves if the [`Shutdown`] is gone untriggered.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn trigger_wakes_listeners() {
        let shutdown = Shutdown::new();
        let mut early = shutdown.listener();

        let waiter = tokio::spawn(async move { early.cancelled().await });
        shutdown.trigger();

        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();

        // Subscribed after the fact
        let mut late = shutdown.listener();
        assert!(late.is_cancelled());
        timeout(Duration::from_secs(1), late.cancelled()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pending_without_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        assert!(!shutdown.is_triggered());
        assert!(timeout(Duration::from_secs(5), listener.cancelled()).await.is_err());
    }
}
