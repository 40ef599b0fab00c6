//! Fan-out of destination changes to passive listeners

use super::{DestinationConfig, DestinationKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

const BROADCAST_CAPACITY: usize = 256;

/// A single registry change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub kind: DestinationKind,
    pub config: DestinationConfig,
}

/// Synchronous listener, called on the controller's task for every change
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, update: &StatusUpdate);
}

/// Delivers every registry change to registered observers and async subscribers
pub struct StatusObserverHub {
    observers: RwLock<Vec<Arc<dyn StatusObserver>>>,
    updates: broadcast::Sender<StatusUpdate>,
}

impl StatusObserverHub {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            observers: RwLock::new(Vec::new()),
            updates,
        }
    }

    pub fn register(&self, observer: Arc<dyn StatusObserver>) {
        self.observers.write().push(observer);
    }

    /// Subscribe to changes published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn publish(&self, kind: DestinationKind, config: DestinationConfig) {
        let update = StatusUpdate { kind, config };

        // Clone the list so observers may register others without deadlocking
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_status(&update);
        }

        if self.updates.send(update).is_err() {
            trace!(kind = %kind, "no async subscribers for status update");
        }
    }
}

impl Default for StatusObserverHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder(Mutex<Vec<StatusUpdate>>);

    impl StatusObserver for Recorder {
        fn on_status(&self, update: &StatusUpdate) {
            self.0.lock().push(update.clone());
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_observers_and_subscribers() {
        let hub = StatusObserverHub::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        hub.register(recorder.clone());
        let mut rx = hub.subscribe();

        hub.publish(DestinationKind::SystemBackup, DestinationConfig::enabled_with(None));

        assert_eq!(recorder.0.lock().len(), 1);
        let update = rx.recv().await.unwrap();
        assert_eq!(update.kind, DestinationKind::SystemBackup);
        assert!(update.config.enabled);
    }

    #[test]
    fn test_publish_without_listeners() {
        let hub = StatusObserverHub::new();
        hub.publish(DestinationKind::LocalFile, DestinationConfig::disabled());
        assert_eq!(hub.observer_count(), 0);
    }
}
