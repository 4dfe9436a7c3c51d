//! SSDP wire format: M-SEARCH construction, response parsing and sockets.
//!
//! WeMo devices answer an M-SEARCH with a unicast response to the sending
//! socket, so the same socket is used for send AND receive.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use reqwest::Url;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use super::types::{Announcement, DeviceIdentity, DiscoveryDomain, DiscoveryError};
use crate::protocol_constants::{
    SSDP_MX, SSDP_SEARCH_TARGET, VENDOR_AGENT_HEADER, VENDOR_AGENT_TOKEN,
};

/// Builds the M-SEARCH request for `domain`.
pub fn build_msearch_message(domain: DiscoveryDomain) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         ST: {}\r\n\
         MX: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\r\n",
        domain.host_header(),
        SSDP_SEARCH_TARGET,
        SSDP_MX
    )
}

/// Splits a header block into lowercase keys and trimmed values.
///
/// Lines without a colon (including the status line) are skipped. Values
/// keep any colons after the first one, so URLs survive intact.
pub fn parse_headers(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Extracts the device identifier from a USN (`uuid:<Type>-<rest>::...`).
pub fn identifier_from_usn(usn: &str) -> Option<&str> {
    usn.split(':').nth(1).filter(|id| !id.is_empty())
}

/// Parses a datagram into an [`Announcement`].
///
/// Returns `None` for anything that is not a WeMo announcement: missing
/// vendor marker, missing or malformed USN, or missing location.
pub fn parse_announcement(data: &[u8], source: SocketAddr) -> Option<Announcement> {
    let text = String::from_utf8_lossy(data);
    let headers = parse_headers(&text);

    let agent = headers.get(VENDOR_AGENT_HEADER)?;
    if !agent.eq_ignore_ascii_case(VENDOR_AGENT_TOKEN) {
        return None;
    }

    let usn = headers.get("usn")?.clone();
    let identifier = identifier_from_usn(&usn)?.to_string();
    let location = headers.get("location")?.clone();
    let host = host_from_location(&location).unwrap_or_else(|| source.ip().to_canonical());

    Some(Announcement {
        identity: DeviceIdentity {
            identifier,
            location,
            host,
        },
        usn,
        headers,
    })
}

/// Resolves the host of a description URL to an IP address.
fn host_from_location(location: &str) -> Option<IpAddr> {
    let url = Url::parse(location).ok()?;
    url.host_str()?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}

/// Creates a non-blocking UDP socket for searching in `domain`.
///
/// Sets up socket options for SSDP discovery:
/// - SO_REUSEADDR for rapid restarts
/// - Multicast TTL (hops on IPv6) of 1, keeping searches on the local link
pub(crate) fn create_socket(domain: DiscoveryDomain) -> Result<UdpSocket, DiscoveryError> {
    let (socket_domain, bind_addr) = match domain {
        DiscoveryDomain::V4 => (
            Domain::IPV4,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        ),
        DiscoveryDomain::V6 => (
            Domain::IPV6,
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        ),
    };

    let socket = Socket::new(socket_domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEADDR for {}: {}", domain, e);
    }

    match domain {
        DiscoveryDomain::V4 => {
            if let Err(e) = socket.set_multicast_ttl_v4(1) {
                log::warn!("[SSDP] Failed to set multicast TTL: {}", e);
            }
        }
        DiscoveryDomain::V6 => {
            if let Err(e) = socket.set_only_v6(true) {
                log::warn!("[SSDP] Failed to set IPV6_V6ONLY: {}", e);
            }
            if let Err(e) = socket.set_multicast_hops_v6(1) {
                log::warn!("[SSDP] Failed to set multicast hops: {}", e);
            }
        }
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;
    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}
