//! SSDP discovery of WeMo devices.
//!
//! - [`ssdp`]: wire format and socket setup
//! - [`engine`]: the long-running [`DiscoveryEngine`]
//! - [`types`]: identities, announcements and errors

pub mod engine;
pub mod ssdp;
pub mod types;

pub use engine::DiscoveryEngine;
pub use types::{Announcement, DeviceIdentity, DiscoveryDomain, DiscoveryError, DiscoveryResult};
