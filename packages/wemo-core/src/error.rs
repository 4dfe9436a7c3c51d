//! Centralized error types for the WeMo core library.
//!
//! Each module defines its own `thiserror` enum. This module adds:
//! - [`ErrorCode`] for machine-readable codes
//! - [`ErrorCategory`], the coarse taxonomy used for propagation decisions
//! - [`WemoError`], the umbrella type returned by [`Environment`](crate::Environment)

use thiserror::Error;

use crate::config::ConfigError;
use crate::context::NetworkError;
use crate::device::{ActionCause, ActionError, CapabilityError, DeviceError, LoadError};
use crate::discovery::DiscoveryError;
use crate::subscription::SubscriptionError;
use crate::transport::TransportError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    fn code(&self) -> &'static str;
}

/// Coarse classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// HTTP or socket failure after the retry budget was spent.
    TransportFailure,
    /// A liveness check failed.
    UnreachableDevice,
    /// The requested service or action does not exist on the device.
    UnknownCapability,
    /// The device refused or dropped an event lease.
    InvalidSubscription,
    /// A document or datagram could not be parsed.
    MalformedMessage,
    /// The device answered an action with a fault or error status.
    DeviceRejected,
    Configuration,
    Network,
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Client(_) => "http_client_failed",
            Self::Exhausted { .. } => "http_retries_exhausted",
            Self::Status { .. } => "http_error_status",
            Self::InvalidMethod(_) => "http_invalid_method",
        }
    }
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::NoSockets => "no_discovery_sockets",
        }
    }
}

impl ErrorCode for ActionCause {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::HttpStatus(_) => "soap_http_status",
            Self::Fault(_) => "soap_fault",
            Self::Malformed(_) => "soap_parse_error",
            Self::Cancelled => "action_cancelled",
            Self::Timeout(_) => "action_timeout",
        }
    }
}

impl ErrorCode for LoadError {
    fn code(&self) -> &'static str {
        match self {
            Self::Fetch { source, .. } => source.code(),
            Self::Malformed { .. } => "description_parse_error",
            Self::InitialState(e) => e.cause.code(),
            Self::IncompleteState { .. } => "initial_state_missing",
        }
    }
}

impl ErrorCode for CapabilityError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownService { .. } => "unknown_service",
            Self::UnknownAction { .. } => "unknown_action",
        }
    }
}

impl ErrorCode for DeviceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Capability(e) => e.code(),
            Self::Action(e) => e.cause.code(),
            Self::Unreachable { .. } => "device_unreachable",
            Self::MissingField { .. } => "missing_response_field",
        }
    }
}

impl ErrorCode for SubscriptionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::Rejected { .. } => "gena_subscription_rejected",
            Self::MissingSid(_) => "gena_missing_sid",
            Self::ListenerBind { .. } => "gena_listener_bind_failed",
            Self::ListenerNotRunning => "gena_listener_not_running",
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPortRange { .. } => "invalid_port_range",
            Self::ZeroValue(_) => "zero_value",
            Self::NoDeviceKinds => "no_device_kinds",
        }
    }
}

impl ErrorCode for NetworkError {
    fn code(&self) -> &'static str {
        match self {
            Self::Detection(_) => "ip_detection_failed",
            Self::NoDetector => "no_ip_detector",
        }
    }
}

/// Umbrella error for the library's public entry points.
#[derive(Debug, Error)]
pub enum WemoError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ErrorCode for WemoError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::Discovery(e) => e.code(),
            Self::Load(e) => e.code(),
            Self::Capability(e) => e.code(),
            Self::Action(e) => e.cause.code(),
            Self::Device(e) => e.code(),
            Self::Subscription(e) => e.code(),
            Self::Network(e) => e.code(),
            Self::Config(e) => e.code(),
        }
    }
}

fn action_category(cause: &ActionCause) -> ErrorCategory {
    match cause {
        ActionCause::Transport(_) | ActionCause::Timeout(_) | ActionCause::Cancelled => {
            ErrorCategory::TransportFailure
        }
        ActionCause::Malformed(_) => ErrorCategory::MalformedMessage,
        ActionCause::HttpStatus(_) | ActionCause::Fault(_) => ErrorCategory::DeviceRejected,
    }
}

impl WemoError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::TransportFailure,
            Self::Discovery(_) | Self::Network(_) => ErrorCategory::Network,
            Self::Load(LoadError::Fetch { .. }) => ErrorCategory::TransportFailure,
            Self::Load(LoadError::Malformed { .. }) => ErrorCategory::MalformedMessage,
            Self::Load(LoadError::InitialState(e)) => action_category(&e.cause),
            Self::Load(LoadError::IncompleteState { .. }) => ErrorCategory::MalformedMessage,
            Self::Capability(_) => ErrorCategory::UnknownCapability,
            Self::Action(e) => action_category(&e.cause),
            Self::Device(DeviceError::Capability(_)) => ErrorCategory::UnknownCapability,
            Self::Device(DeviceError::Action(e)) => action_category(&e.cause),
            Self::Device(DeviceError::Unreachable { .. }) => ErrorCategory::UnreachableDevice,
            Self::Device(DeviceError::MissingField { .. }) => ErrorCategory::MalformedMessage,
            Self::Subscription(SubscriptionError::Transport(_)) => ErrorCategory::TransportFailure,
            Self::Subscription(SubscriptionError::ListenerBind { .. }) => ErrorCategory::Network,
            Self::Subscription(_) => ErrorCategory::InvalidSubscription,
            Self::Config(_) => ErrorCategory::Configuration,
        }
    }
}

/// Convenient Result alias for library entry points.
pub type WemoResult<T> = Result<T, WemoError>;
