//! Event emitter abstraction for decoupling the environment from delivery.
//!
//! The environment depends on the [`EventEmitter`] trait rather than a
//! concrete channel, enabling testing and alternative delivery.

use super::DeviceEvent;

/// Trait for emitting device events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: DeviceEvent);
}

/// No-op emitter. Events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: DeviceEvent) {}
}

/// Logging emitter for debugging and development.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit(&self, event: DeviceEvent) {
        tracing::debug!(?event, "device_event");
    }
}
