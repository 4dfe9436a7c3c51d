//! Callback addressing for event subscriptions.
//!
//! Devices deliver NOTIFY requests to the URL we hand them in the GENA
//! `CALLBACK` header. [`NetworkContext`] owns the two halves of that URL:
//! the IP devices can reach us at and the port the listener bound.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use parking_lot::RwLock;

/// Errors that can occur while resolving the local address.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Could not detect local IP address.
    #[error("Failed to detect local IP: {0}")]
    Detection(String),

    /// No IP detector configured (explicit mode).
    #[error("No IP detector configured (using explicit mode)")]
    NoDetector,
}

/// Trait for detecting the IP address devices should call back to.
pub trait IpDetector: Send + Sync {
    fn detect(&self) -> Result<IpAddr, NetworkError>;
}

/// Detects the address of the interface holding the default route.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    #[must_use]
    pub fn arc() -> Arc<dyn IpDetector> {
        Arc::new(Self)
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self) -> Result<IpAddr, NetworkError> {
        local_ip_address::local_ip().map_err(|e| NetworkError::Detection(e.to_string()))
    }
}

/// Shared advertise address for the callback listener.
///
/// Clones share state, so the port recorded by the listener is visible to
/// every lease that builds a `CALLBACK` header afterwards.
#[derive(Clone)]
pub struct NetworkContext {
    advertise_ip: Arc<RwLock<IpAddr>>,
    /// 0 until the listener binds.
    port: Arc<RwLock<u16>>,
    ip_detector: Option<Arc<dyn IpDetector>>,
}

impl NetworkContext {
    /// Uses a fixed advertise IP (servers, tests, multi-homed hosts).
    #[must_use]
    pub fn explicit(advertise_ip: IpAddr) -> Self {
        Self {
            advertise_ip: Arc::new(RwLock::new(advertise_ip)),
            port: Arc::new(RwLock::new(0)),
            ip_detector: None,
        }
    }

    /// Detects the advertise IP once up front.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial detection fails.
    pub fn auto_detect(ip_detector: Arc<dyn IpDetector>) -> Result<Self, NetworkError> {
        let ip = ip_detector.detect()?;
        log::info!("[Network] Advertising callbacks on {}", ip);
        Ok(Self {
            advertise_ip: Arc::new(RwLock::new(ip)),
            port: Arc::new(RwLock::new(0)),
            ip_detector: Some(ip_detector),
        })
    }

    /// Re-runs detection, e.g. after the host changed networks.
    pub fn refresh_ip(&self) -> Result<IpAddr, NetworkError> {
        let detector = self.ip_detector.as_ref().ok_or(NetworkError::NoDetector)?;
        let ip = detector.detect()?;
        *self.advertise_ip.write() = ip;
        Ok(ip)
    }

    #[must_use]
    pub fn advertise_ip(&self) -> IpAddr {
        *self.advertise_ip.read()
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        *self.port.read()
    }

    pub(crate) fn set_port(&self, port: u16) {
        *self.port.write() = port;
    }

    /// URL placed in GENA `CALLBACK` headers, `http://<ip>:<port>` with no
    /// path. WeMo devices POST to whatever URL they are given.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("http://{}", SocketAddr::new(self.advertise_ip(), self.port()))
    }
}
