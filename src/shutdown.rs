use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// Coordinates graceful shutdown across components. Every long-running task
/// holds a receiver; one broadcast tells them all to wind down.
pub struct ShutdownManager {
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
        }
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let shutdown_tx = self.shutdown_tx.read().await;
        match shutdown_tx.as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                // Already shut down; hand out a receiver that fires at once.
                let (tx, rx) = broadcast::channel(1);
                let _ = tx.send(());
                rx
            }
        }
    }

    pub async fn shutdown(&self) {
        let mut shutdown_tx = self.shutdown_tx.write().await;
        if let Some(tx) = shutdown_tx.take() {
            debug!(subscribers = tx.receiver_count(), "broadcasting shutdown");
            let _ = tx.send(());
            info!("shutdown signal sent");
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ShutdownManager {
    fn clone(&self) -> Self {
        Self {
            shutdown_tx: Arc::clone(&self.shutdown_tx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_the_signal() {
        let manager = ShutdownManager::new();
        let mut rx = manager.subscribe().await;
        manager.shutdown().await;
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_late_subscribers_fire_immediately() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;
        let mut rx = manager.subscribe().await;
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_repeated_shutdown_is_harmless() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;
        manager.shutdown().await;
    }
}
