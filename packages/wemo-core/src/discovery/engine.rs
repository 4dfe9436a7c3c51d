//! Long-running SSDP discovery engine.
//!
//! The engine owns one UDP socket per discovery domain. A send task repeats
//! M-SEARCH bursts forever and a receive task per socket turns datagrams into
//! [`Announcement`]s. Presence is tracked by identifier; absence is never
//! signalled on the wire, so consumers call [`DiscoveryEngine::forget`] when
//! they decide a device is gone.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ssdp::{build_msearch_message, create_socket, parse_announcement};
use super::types::{Announcement, DiscoveryDomain, DiscoveryError, DiscoveryResult};
use crate::protocol_constants::SSDP_RECV_BUFFER_SIZE;

/// Multicast discovery engine.
pub struct DiscoveryEngine {
    domains: Vec<DiscoveryDomain>,
    sockets: RwLock<Vec<(DiscoveryDomain, Arc<UdpSocket>)>>,
    known: RwLock<HashMap<String, Announcement>>,
    found_tx: mpsc::UnboundedSender<Announcement>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DiscoveryEngine {
    /// Creates an engine for `domains` and the channel its "found" events
    /// are delivered on.
    pub fn new(
        domains: Vec<DiscoveryDomain>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Announcement>) {
        let (found_tx, found_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            domains,
            sockets: RwLock::new(Vec::new()),
            known: RwLock::new(HashMap::new()),
            found_tx,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });
        (engine, found_rx)
    }

    /// Opens the sockets and starts a receive loop on each.
    ///
    /// A domain whose socket cannot be created is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NoSockets`] if no domain could be opened.
    pub fn start(self: &Arc<Self>) -> DiscoveryResult<usize> {
        let mut opened = Vec::new();
        for &domain in &self.domains {
            match create_socket(domain) {
                Ok(socket) => opened.push((domain, Arc::new(socket))),
                Err(e) => log::warn!("[SSDP] Failed to open {} socket: {}", domain, e),
            }
        }

        if opened.is_empty() {
            return Err(DiscoveryError::NoSockets);
        }

        let mut tasks = self.tasks.lock();
        for (domain, socket) in &opened {
            let engine = Arc::clone(self);
            let socket = Arc::clone(socket);
            let domain = *domain;
            tasks.push(tokio::spawn(async move {
                engine.receive_loop(domain, socket).await;
            }));
        }

        let count = opened.len();
        *self.sockets.write() = opened;
        log::info!("[SSDP] Discovery started on {} socket(s)", count);
        Ok(count)
    }

    /// Starts the repeating search cycle: one M-SEARCH per second for
    /// `interval_secs` seconds, then idle for `timeout`, until
    /// [`stop`](Self::stop).
    pub fn start_broadcast(self: &Arc<Self>, interval_secs: u64, timeout: Duration) {
        let engine = Arc::clone(self);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = engine.broadcast(interval_secs) => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(timeout) => {}
                }
            }
            log::debug!("[SSDP] Broadcast cycle stopped");
        });
        self.tasks.lock().push(handle);
    }

    /// Sends one M-SEARCH per second for `seconds` seconds.
    pub async fn broadcast(&self, seconds: u64) {
        for i in 0..seconds {
            if i > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            self.send_search().await;
        }
    }

    /// Sends a single M-SEARCH on every open socket.
    pub async fn send_search(&self) {
        let sockets: Vec<_> = self.sockets.read().clone();
        for (domain, socket) in sockets {
            let msg = build_msearch_message(domain);
            match socket.send_to(msg.as_bytes(), domain.group()).await {
                Ok(_) => log::trace!("[SSDP] Sent M-SEARCH on {}", domain),
                Err(e) => log::warn!("[SSDP] Failed to send M-SEARCH on {}: {}", domain, e),
            }
        }
    }

    async fn receive_loop(&self, domain: DiscoveryDomain, socket: Arc<UdpSocket>) {
        let mut buf = [0u8; SSDP_RECV_BUFFER_SIZE];
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, source)) => {
                        self.handle_datagram(&buf[..len], source);
                    }
                    Err(e) => {
                        log::warn!("[SSDP] Socket recv error on {}: {}", domain, e);
                    }
                }
            }
        }
        log::debug!("[SSDP] Receive loop on {} stopped", domain);
    }

    /// Processes one inbound datagram.
    ///
    /// Returns true if a "found" event was emitted. Unrelated or malformed
    /// datagrams are dropped; repeats for a known identifier only refresh
    /// the cached headers.
    pub fn handle_datagram(&self, data: &[u8], source: SocketAddr) -> bool {
        let Some(announcement) = parse_announcement(data, source) else {
            log::trace!("[SSDP] Ignoring datagram from {}", source);
            return false;
        };

        let identifier = announcement.identity.identifier.clone();
        {
            let mut known = self.known.write();
            if let Some(cached) = known.get_mut(&identifier) {
                cached.headers = announcement.headers;
                return false;
            }
            known.insert(identifier.clone(), announcement.clone());
        }

        log::debug!(
            "[SSDP] Found {} at {}",
            identifier,
            announcement.identity.location
        );
        if self.found_tx.send(announcement).is_err() {
            log::debug!("[SSDP] No consumer for discovery events");
        }
        true
    }

    /// Forgets `identifier` so its next announcement fires "found" again.
    pub fn forget(&self, identifier: &str) -> bool {
        self.known.write().remove(identifier).is_some()
    }

    #[must_use]
    pub fn is_known(&self, identifier: &str) -> bool {
        self.known.read().contains_key(identifier)
    }

    /// Returns the cached announcement for `identifier`.
    #[must_use]
    pub fn announcement(&self, identifier: &str) -> Option<Announcement> {
        self.known.read().get(identifier).cloned()
    }

    #[must_use]
    pub fn known_identifiers(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.known.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancels the broadcast cycle and receive loops and closes the sockets.
    pub fn stop(&self) {
        self.cancel.cancel();
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        self.sockets.write().clear();
        log::info!("[SSDP] Discovery stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announcement(usn: &str, extra: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\n\
             LOCATION: http://10.0.0.5:49152/setup.xml\r\n\
             X-User-Agent: redsonic\r\n\
             USN: {usn}\r\n\
             {extra}\r\n"
        )
    }

    fn source() -> SocketAddr {
        "10.0.0.5:1900".parse().unwrap()
    }

    #[test]
    fn first_announcement_fires_found() {
        let (engine, mut rx) = DiscoveryEngine::new(vec![DiscoveryDomain::V4]);
        let data = announcement("uuid:Socket-1_0-221234K1::upnp:rootdevice", "");

        assert!(engine.handle_datagram(data.as_bytes(), source()));
        let found = rx.try_recv().unwrap();
        assert_eq!(found.identity.identifier, "Socket-1_0-221234K1");
        assert!(engine.is_known("Socket-1_0-221234K1"));
    }

    #[test]
    fn repeat_announcement_refreshes_headers_only() {
        let (engine, mut rx) = DiscoveryEngine::new(vec![DiscoveryDomain::V4]);
        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";

        assert!(engine.handle_datagram(announcement(usn, "BOOTID: 1\r\n").as_bytes(), source()));
        assert!(!engine.handle_datagram(announcement(usn, "BOOTID: 2\r\n").as_bytes(), source()));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        let cached = engine.announcement("Socket-1_0-221234K1").unwrap();
        assert_eq!(cached.headers.get("bootid").map(String::as_str), Some("2"));
    }

    #[test]
    fn unrelated_traffic_never_fires() {
        let (engine, mut rx) = DiscoveryEngine::new(vec![DiscoveryDomain::V4]);
        let sonos = "HTTP/1.1 200 OK\r\n\
                     LOCATION: http://10.0.0.9:1400/xml/device_description.xml\r\n\
                     USN: uuid:RINCON_ABC::urn:schemas-upnp-org:device:ZonePlayer:1\r\n\r\n";

        assert!(!engine.handle_datagram(sonos.as_bytes(), source()));
        assert!(!engine.handle_datagram(b"NOTIFY * HTTP/1.1\r\n\r\n", source()));
        assert!(rx.try_recv().is_err());
        assert!(engine.known_identifiers().is_empty());
    }

    #[test]
    fn forget_allows_rediscovery() {
        let (engine, mut rx) = DiscoveryEngine::new(vec![DiscoveryDomain::V4]);
        let data = announcement("uuid:Sensor-1_0-221517K0101769::upnp:rootdevice", "");

        assert!(engine.handle_datagram(data.as_bytes(), source()));
        assert!(engine.forget("Sensor-1_0-221517K0101769"));
        assert!(!engine.forget("Sensor-1_0-221517K0101769"));
        assert!(engine.handle_datagram(data.as_bytes(), source()));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn start_and_stop_close_sockets() {
        let (engine, _rx) = DiscoveryEngine::new(vec![DiscoveryDomain::V4]);
        let opened = engine.start().unwrap();
        assert_eq!(opened, 1);

        engine.start_broadcast(1, Duration::from_secs(60));
        engine.stop();
        assert!(engine.sockets.read().is_empty());
        assert!(engine.tasks.lock().is_empty());
    }
}
