//! Change notification for observers (room views, WebSocket clients).
//!
//! Fire-and-forget: events are published after the corresponding commit and a
//! missed or lagged event never affects what is persisted.

use crate::bingo::types::DrawEvent;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DrawEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: DrawEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(draw_id = %e.0.draw_id(), "No subscribers for draw event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DrawEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
