//! Event emitter trait for cross-crate event broadcasting.
//!
//! Implementations handle transport details (channels, SSE, etc.).

use tokio::sync::broadcast;

use crate::events::AppEvent;

/// Trait for emitting application events.
///
/// Emitting never blocks. Supervisors call this from inside lifecycle
/// transitions.
pub trait AppEventEmitter: Send + Sync {
    fn emit(&self, event: AppEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn AppEventEmitter>;
}

/// Discards all events. For tests and one-shot CLI commands.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl AppEventEmitter for NoopEmitter {
    fn emit(&self, _event: AppEvent) {}

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lag and drop old events rather than stall emitters.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    sender: broadcast::Sender<AppEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

impl AppEventEmitter for BroadcastEmitter {
    fn emit(&self, event: AppEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServerState;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn AppEventEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(AppEvent::config_added("word"));
        let _boxed = emitter.clone_box();
    }

    #[tokio::test]
    async fn test_broadcast_emitter_delivers() {
        let emitter = BroadcastEmitter::new(8);
        let mut rx = emitter.subscribe();
        emitter.emit(AppEvent::state_changed(
            "word",
            ServerState::Stopped,
            ServerState::Starting,
        ));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.server_id(), "word");
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        BroadcastEmitter::default().emit(AppEvent::config_removed("gone"));
    }
}
