use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use deadlines_types::ChangeEvent;

/// Receives "something changed under `root`". Fire-and-forget.
pub trait ChangeSink: Send + Sync {
    fn notify_change(&self, root: &str);
}

/// Fans change events out to every subscriber.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<ChangeEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    pub fn broadcast(&self, event: ChangeEvent) {
        // No subscribers is not an error.
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSink for Dispatcher {
    fn notify_change(&self, root: &str) {
        debug!(root, "Change notification");
        self.broadcast(ChangeEvent::new(root));
    }
}
