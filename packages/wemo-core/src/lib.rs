//! WeMo Core - async control-plane client for Belkin WeMo devices.
//!
//! Devices are found over SSDP, modelled from their UPnP description
//! documents, controlled with SOAP actions and observed through GENA event
//! subscriptions.
//!
//! # Architecture
//!
//! - [`discovery`]: SSDP search cycle and announcement parsing
//! - [`device`]: capability model (devices, services, actions) and kind-specific decoding
//! - [`subscription`]: GENA leases, renewal scheduling and the callback listener
//! - [`environment`]: the orchestrator owning the live device set
//! - [`transport`]: retrying HTTP shared by every outbound request
//! - [`events`]: device lifecycle events for applications
//! - [`config`], [`context`], [`error`]: configuration, callback addressing and errors
//!
//! # Abstraction Traits
//!
//! - [`EventEmitter`](events::EventEmitter): delivering device events
//! - [`IpDetector`](context::IpDetector): local IP detection for callback URLs

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod device;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod subscription;
pub mod transport;
pub mod xml;

#[cfg(test)]
mod test_fixtures;

// Re-export commonly used types at the crate root
pub use config::{ConfigError, EnvironmentConfig};
pub use context::{IpDetector, LocalIpDetector, NetworkContext, NetworkError};
pub use device::{
    Action, ActionError, ActionOutput, BinaryState, CapabilityError, Device, DeviceError,
    DeviceKind, Explanation, InsightParams, LoadError, PendingResult, Service,
};
pub use discovery::{Announcement, DeviceIdentity, DiscoveryEngine};
pub use environment::{fuzzy_match, Environment, EnvironmentBuilder};
pub use error::{ErrorCategory, ErrorCode, WemoError, WemoResult};
pub use events::{
    BroadcastEventBridge, DeviceEvent, EventEmitter, LoggingEventEmitter, LossReason,
    NoopEventEmitter,
};
pub use subscription::{Lease, LeasePolicy, LeaseState, SubscriptionRegistry, SubscriptionTarget};
pub use transport::{HttpTransport, RetryPolicy, TransportError};
