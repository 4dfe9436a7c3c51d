//! Bridge from [`EventEmitter`] to a broadcast channel.

use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::DeviceEvent;

/// Forwards device events to a `tokio::sync::broadcast` channel so several
/// consumers can follow the device set independently.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<DeviceEvent>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit(&self, event: DeviceEvent) {
        if let Err(e) = self.tx.send(event) {
            log::trace!("[EventBridge] No broadcast receivers: {}", e);
        }
    }
}
