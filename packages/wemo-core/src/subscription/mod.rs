//! GENA event subscriptions.
//!
//! This module provides:
//! - [`GenaClient`] for SUBSCRIBE / UNSUBSCRIBE requests
//! - [`Lease`], the per-host state machine with its renewal schedule
//! - [`SubscriptionRegistry`], which owns the leases, the callback listener
//!   and the property listener table

mod callbacks;
pub mod gena_client;
pub mod lease;
mod listener;
pub mod notify;
mod registry;

pub use callbacks::{ListenerId, PropertyCallback};
pub use gena_client::{GenaClient, RenewOutcome, SubscribeResponse};
pub use lease::{Lease, LeasePolicy, LeaseState};
pub use notify::parse_property_set;
pub use registry::{SubscriptionRegistry, SubscriptionTarget};

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur during GENA operations.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The device answered a SUBSCRIBE with a non-success status.
    #[error("SUBSCRIBE {url} rejected with HTTP {status}")]
    Rejected { url: String, status: u16 },

    /// A successful SUBSCRIBE response carried no SID.
    #[error("SUBSCRIBE {0} returned no SID")]
    MissingSid(String),

    /// No port of the configured range could be bound.
    #[error("Failed to bind callback listener in {start}-{end}: {reason}")]
    ListenerBind { start: u16, end: u16, reason: String },

    /// A lease was requested before the callback listener started.
    #[error("Callback listener is not running")]
    ListenerNotRunning,
}

/// Convenient Result alias for subscription operations.
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;
