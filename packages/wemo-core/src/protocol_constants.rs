//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by SSDP, SOAP and GENA as WeMo devices speak them.
//! Changing them breaks interoperability with real hardware.

use std::net::{Ipv4Addr, Ipv6Addr};

// ─────────────────────────────────────────────────────────────────────────────
// SSDP (Simple Service Discovery Protocol)
// ─────────────────────────────────────────────────────────────────────────────

/// SSDP IPv4 multicast group.
pub const SSDP_MULTICAST_V4: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// SSDP IPv6 site-local multicast group (`ff05::c`).
pub const SSDP_MULTICAST_V6: Ipv6Addr = Ipv6Addr::new(0xff05, 0, 0, 0, 0, 0, 0, 0xc);

/// SSDP port shared by both multicast groups.
pub const SSDP_PORT: u16 = 1900;

/// Search target sent in every M-SEARCH.
pub const SSDP_SEARCH_TARGET: &str = "upnp:rootdevice";

/// Maximum response delay (seconds) advertised in M-SEARCH.
pub const SSDP_MX: u64 = 2;

/// Header carrying the vendor agent marker (lowercase, headers are normalized).
pub const VENDOR_AGENT_HEADER: &str = "x-user-agent";

/// Vendor token that identifies a WeMo responder.
pub const VENDOR_AGENT_TOKEN: &str = "redsonic";

/// Receive buffer for a single SSDP datagram.
pub const SSDP_RECV_BUFFER_SIZE: usize = 2048;

// ─────────────────────────────────────────────────────────────────────────────
// SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.1 encoding style.
pub const SOAP_ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Service that carries the binary on/off state on every WeMo device.
pub const BASIC_EVENT_SERVICE: &str = "basicevent";

/// Service that carries Insight energy telemetry.
pub const INSIGHT_SERVICE: &str = "insight";

/// State variable name used by queries and event notifications.
pub const BINARY_STATE_PROPERTY: &str = "BinaryState";

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP General Event Notification Architecture)
// ─────────────────────────────────────────────────────────────────────────────

/// XML namespace of the `propertyset` document in NOTIFY bodies.
pub const GENA_EVENT_NS: &str = "urn:schemas-upnp-org:event-1-0";

/// Lease duration assumed when a device omits or garbles the TIMEOUT header.
pub const GENA_FALLBACK_TIMEOUT_SECS: u64 = 1801;

/// Fraction of the granted lease after which a renewal is sent.
pub const GENA_RENEWAL_RATIO: f64 = 0.75;

/// Fixed body returned to every NOTIFY request.
pub const CALLBACK_OK_BODY: &str = "<html><body><h1>200 OK</h1></body></html>";
