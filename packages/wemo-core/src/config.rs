//! Runtime configuration for an [`Environment`](crate::Environment).

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceKind;
use crate::protocol_constants::GENA_RENEWAL_RATIO;
use crate::subscription::LeasePolicy;
use crate::transport::RetryPolicy;

/// Errors raised by [`EnvironmentConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The callback port range is inverted or only half-specified.
    #[error("Invalid callback port range {start}-{end}")]
    InvalidPortRange { start: u16, end: u16 },

    /// A duration that must be positive was configured as zero.
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    /// The kind allow-list is empty, so nothing could ever be tracked.
    #[error("At least one device kind must be enabled")]
    NoDeviceKinds,
}

/// Tunables for discovery, transport and subscriptions.
///
/// Every field has a default matching the behavior of stock WeMo tooling,
/// so an empty YAML document deserializes to a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Run the SSDP discovery engine.
    pub with_discovery: bool,

    /// Run the GENA callback listener and keep event leases.
    pub with_subscribers: bool,

    /// Device kinds the environment tracks. Others are ignored on discovery.
    pub device_kinds: Vec<DeviceKind>,

    /// Also search on the IPv6 site-local group.
    pub discovery_ipv6: bool,

    /// Seconds of one-per-second M-SEARCH bursts per cycle.
    pub broadcast_interval_secs: u64,

    /// Seconds of silence between bursts.
    pub broadcast_timeout_secs: u64,

    /// Attempts per HTTP request before giving up.
    pub http_retries: u32,

    /// Delay between HTTP attempts in milliseconds.
    pub http_retry_delay_ms: u64,

    /// Per-attempt HTTP timeout in seconds.
    pub http_timeout_secs: u64,

    /// Lease duration requested in SUBSCRIBE.
    pub subscription_timeout_secs: u64,

    /// Delay before confirming a subscription whose SID changed or was rejected.
    pub resubscribe_backoff_secs: u64,

    /// Inclusive port range for the callback listener. `(0, 0)` lets the OS pick.
    pub callback_port_range: (u16, u16),

    /// IP advertised in CALLBACK headers. Auto-detected when unset.
    pub advertise_ip: Option<IpAddr>,

    /// Upper bound for blocking helpers such as `Device::get_state`.
    pub action_timeout_secs: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            with_discovery: true,
            with_subscribers: true,
            device_kinds: DeviceKind::ALL.to_vec(),
            discovery_ipv6: false,
            broadcast_interval_secs: 3,
            broadcast_timeout_secs: 60,
            http_retries: 3,
            http_retry_delay_ms: 3000,
            http_timeout_secs: 10,
            subscription_timeout_secs: 1800,
            resubscribe_backoff_secs: 1,
            callback_port_range: (8300, 8990),
            advertise_ip: None,
            action_timeout_secs: 5,
        }
    }
}

impl EnvironmentConfig {
    /// Checks the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (start, end) = self.callback_port_range;
        if (start == 0) != (end == 0) || start > end {
            return Err(ConfigError::InvalidPortRange { start, end });
        }
        if self.http_retries == 0 {
            return Err(ConfigError::ZeroValue("http_retries"));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("http_timeout_secs"));
        }
        if self.subscription_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("subscription_timeout_secs"));
        }
        if self.action_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("action_timeout_secs"));
        }
        if self.with_discovery && self.broadcast_interval_secs == 0 {
            return Err(ConfigError::ZeroValue("broadcast_interval_secs"));
        }
        if self.device_kinds.is_empty() {
            return Err(ConfigError::NoDeviceKinds);
        }
        Ok(())
    }

    /// Retry budget for the HTTP transport.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.http_retries,
            delay: Duration::from_millis(self.http_retry_delay_ms),
        }
    }

    /// Renewal scheduling for event leases.
    #[must_use]
    pub fn lease_policy(&self) -> LeasePolicy {
        LeasePolicy {
            requested_timeout_secs: self.subscription_timeout_secs,
            backoff: Duration::from_secs(self.resubscribe_backoff_secs),
            renewal_ratio: GENA_RENEWAL_RATIO,
        }
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    #[must_use]
    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_timeout_secs)
    }

    /// Returns true if `kind` passes the allow-list.
    #[must_use]
    pub fn accepts(&self, kind: DeviceKind) -> bool {
        self.device_kinds.contains(&kind)
    }
}
