//! Discovery types and errors.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::protocol_constants::{SSDP_MULTICAST_V4, SSDP_MULTICAST_V6, SSDP_PORT};

/// Errors that can occur while running SSDP discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to create or bind a UDP socket.
    #[error("Failed to bind socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// No discovery socket could be opened in any domain.
    #[error("No discovery socket could be opened")]
    NoSockets,
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Multicast domain a discovery socket searches in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryDomain {
    V4,
    V6,
}

impl DiscoveryDomain {
    /// SSDP group address for this domain.
    #[must_use]
    pub fn group(self) -> SocketAddr {
        match self {
            Self::V4 => SocketAddr::new(IpAddr::V4(SSDP_MULTICAST_V4), SSDP_PORT),
            Self::V6 => SocketAddr::new(IpAddr::V6(SSDP_MULTICAST_V6), SSDP_PORT),
        }
    }

    /// Value for the `HOST` header of an M-SEARCH in this domain.
    #[must_use]
    pub fn host_header(self) -> String {
        match self {
            Self::V4 => format!("{}:{}", SSDP_MULTICAST_V4, SSDP_PORT),
            Self::V6 => format!("[{}]:{}", SSDP_MULTICAST_V6, SSDP_PORT),
        }
    }
}

impl fmt::Display for DiscoveryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "SSDP/IPv4"),
            Self::V6 => write!(f, "SSDP/IPv6"),
        }
    }
}

/// Immutable identity of a discovered device.
///
/// The identifier is the join key between discovery, capability and
/// subscription state for as long as the device is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// USN segment after `uuid:` (e.g. `Socket-1_0-221234K1`).
    pub identifier: String,
    /// Description URL from the `location` header.
    pub location: String,
    /// Address the device is reached at and sends NOTIFY from.
    pub host: IpAddr,
}

impl DeviceIdentity {
    /// Device type tag, the identifier up to its first `-`.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        self.identifier
            .split('-')
            .next()
            .unwrap_or(self.identifier.as_str())
    }
}

/// A recognized device announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub identity: DeviceIdentity,
    /// Full USN header value.
    pub usn: String,
    /// All headers, keys lowercased.
    pub headers: BTreeMap<String, String>,
}
