//! Device lifecycle events.
//!
//! This module provides:
//! - [`EventEmitter`] trait the environment emits through
//! - [`BroadcastEventBridge`] for fan-out over a `tokio::sync::broadcast` channel
//! - [`DeviceEvent`], the application-facing event type
//! - [`LossReport`], the internal signal that funnels device loss to the environment

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::device::{BinaryState, DeviceKind};

/// Events describing the tracked device set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// A device finished loading and is ready for use.
    Found {
        identifier: String,
        name: String,
        kind: DeviceKind,
        host: IpAddr,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A device was dropped from the live set.
    Gone {
        identifier: String,
        name: String,
        reason: LossReason,
        timestamp: u64,
    },
    /// The cached binary state of a device changed.
    StateChanged {
        identifier: String,
        name: String,
        state: BinaryState,
        timestamp: u64,
    },
}

/// Why a device was declared gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum LossReason {
    /// An action failed at the transport level.
    ActionFailed(String),
    /// The state query after discovery failed.
    PingFailed(String),
    /// The event lease could not be kept alive.
    SubscriptionLost(String),
}

impl std::fmt::Display for LossReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActionFailed(detail) => write!(f, "action failed: {}", detail),
            Self::PingFailed(detail) => write!(f, "ping failed: {}", detail),
            Self::SubscriptionLost(detail) => write!(f, "subscription lost: {}", detail),
        }
    }
}

/// A report that a device should be considered gone.
///
/// Devices and the subscription registry send these on an unbounded channel;
/// the environment is the only consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossReport {
    pub identifier: String,
    pub host: IpAddr,
    pub reason: LossReason,
}

/// Returns the current Unix time in milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_event_serializes_with_tagged_reason() {
        let event = DeviceEvent::Gone {
            identifier: "Socket-1_0-221234K1".into(),
            name: "Desk Lamp".into(),
            reason: LossReason::PingFailed("timeout".into()),
            timestamp: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "gone");
        assert_eq!(json["reason"]["kind"], "pingFailed");
        assert_eq!(json["reason"]["detail"], "timeout");
    }

    #[test]
    fn loss_reason_display_includes_detail() {
        let reason = LossReason::SubscriptionLost("HTTP 500".into());
        assert_eq!(reason.to_string(), "subscription lost: HTTP 500");
    }
}
