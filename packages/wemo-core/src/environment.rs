//! The orchestrator tying discovery, devices and subscriptions together.
//!
//! An [`Environment`] owns the live device set. Discovery announcements flow
//! in through one channel and loss reports through another; the environment
//! is the only place devices are added or dropped.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EnvironmentConfig;
use crate::context::{LocalIpDetector, NetworkContext};
use crate::device::{Device, DeviceKind};
use crate::discovery::{Announcement, DiscoveryDomain, DiscoveryEngine};
use crate::error::WemoResult;
use crate::events::{
    now_millis, DeviceEvent, EventEmitter, LoggingEventEmitter, LossReason, LossReport,
};
use crate::protocol_constants::BINARY_STATE_PROPERTY;
use crate::subscription::SubscriptionRegistry;
use crate::transport::HttpTransport;

/// Callback invoked once per device after it is fully set up.
pub type DiscoveredCallback = Arc<dyn Fn(Arc<Device>) + Send + Sync>;

/// Builder for [`Environment`].
pub struct EnvironmentBuilder {
    config: EnvironmentConfig,
    on_discovered: Option<DiscoveredCallback>,
    emitter: Option<Arc<dyn EventEmitter>>,
    network: Option<NetworkContext>,
}

impl EnvironmentBuilder {
    pub fn new(config: EnvironmentConfig) -> Self {
        Self {
            config,
            on_discovered: None,
            emitter: None,
            network: None,
        }
    }

    /// Sets the callback invoked for each newly ready device.
    pub fn on_discovered<F>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<Device>) + Send + Sync + 'static,
    {
        self.on_discovered = Some(Arc::new(callback));
        self
    }

    /// Sets the emitter for [`DeviceEvent`]s. Defaults to logging.
    pub fn emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Overrides the network context used for callback URLs.
    pub fn network(mut self, network: NetworkContext) -> Self {
        self.network = Some(network);
        self
    }

    /// Validates the configuration and wires the components.
    ///
    /// Nothing touches the network until [`Environment::start`].
    pub fn build(self) -> WemoResult<Environment> {
        let config = self.config;
        config.validate()?;

        let transport = HttpTransport::new(config.http_timeout(), config.retry_policy())?;

        let network = match (self.network, config.advertise_ip) {
            (Some(network), _) => network,
            (None, Some(ip)) => NetworkContext::explicit(ip),
            (None, None) if config.with_subscribers => {
                NetworkContext::auto_detect(LocalIpDetector::arc())?
            }
            (None, None) => NetworkContext::explicit(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        };

        let (discovery, found_rx) = if config.with_discovery {
            let mut domains = vec![DiscoveryDomain::V4];
            if config.discovery_ipv6 {
                domains.push(DiscoveryDomain::V6);
            }
            let (engine, rx) = DiscoveryEngine::new(domains);
            (Some(engine), Some(rx))
        } else {
            (None, None)
        };

        let registry = SubscriptionRegistry::new(
            transport.clone(),
            config.lease_policy(),
            network,
            config.callback_port_range,
        );
        let (loss_tx, loss_rx) = mpsc::unbounded_channel();
        registry.set_loss_reporter(loss_tx.clone());

        Ok(Environment {
            inner: Arc::new(EnvironmentInner {
                config,
                transport,
                discovery,
                found_rx: Mutex::new(found_rx),
                registry,
                devices: DashMap::new(),
                pending: Mutex::new(HashSet::new()),
                loss_tx,
                loss_rx: Mutex::new(Some(loss_rx)),
                on_discovered: self.on_discovered,
                emitter: self
                    .emitter
                    .unwrap_or_else(|| Arc::new(LoggingEventEmitter)),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }
}

struct EnvironmentInner {
    config: EnvironmentConfig,
    transport: HttpTransport,
    discovery: Option<Arc<DiscoveryEngine>>,
    found_rx: Mutex<Option<mpsc::UnboundedReceiver<Announcement>>>,
    registry: SubscriptionRegistry,
    devices: DashMap<String, Arc<Device>>,
    /// Identifiers currently being loaded.
    pending: Mutex<HashSet<String>>,
    loss_tx: mpsc::UnboundedSender<LossReport>,
    loss_rx: Mutex<Option<mpsc::UnboundedReceiver<LossReport>>>,
    on_discovered: Option<DiscoveredCallback>,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Tracks WeMo devices on the local network.
///
/// Cloning is cheap; clones share state. Call [`stop`](Self::stop) before
/// dropping the last clone to release sockets and background tasks.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

impl Environment {
    pub fn builder(config: EnvironmentConfig) -> EnvironmentBuilder {
        EnvironmentBuilder::new(config)
    }

    /// Starts the callback listener, discovery and the loss funnel.
    pub async fn start(&self) -> WemoResult<()> {
        let inner = &self.inner;

        if inner.config.with_subscribers {
            inner.registry.start_listener().await?;
        }

        if let Some(discovery) = &inner.discovery {
            discovery.start()?;
            discovery.start_broadcast(
                inner.config.broadcast_interval_secs,
                inner.config.broadcast_timeout(),
            );
        }

        let found_rx = inner.found_rx.lock().take();
        if let Some(mut found_rx) = found_rx {
            let env = self.clone();
            let cancel = inner.cancel.clone();
            inner.tasks.lock().push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        announcement = found_rx.recv() => {
                            let Some(announcement) = announcement else { break };
                            let env = env.clone();
                            tokio::spawn(async move {
                                env.handle_announcement(announcement).await;
                            });
                        }
                    }
                }
            }));
        }

        let loss_rx = inner.loss_rx.lock().take();
        if let Some(mut loss_rx) = loss_rx {
            let env = self.clone();
            let cancel = inner.cancel.clone();
            inner.tasks.lock().push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        report = loss_rx.recv() => {
                            let Some(report) = report else { break };
                            env.device_gone(&report.identifier, report.reason);
                        }
                    }
                }
            }));
        }

        log::info!("[Environment] Started");
        Ok(())
    }

    /// Handles one discovery announcement.
    ///
    /// Returns `true` if a new device was added to the live set.
    pub async fn handle_announcement(&self, announcement: Announcement) -> bool {
        let inner = &self.inner;
        let identity = announcement.identity;
        let identifier = identity.identifier.clone();

        let Some(kind) = DeviceKind::from_type_tag(identity.type_tag()) else {
            log::debug!("[Environment] Ignoring unknown device type {}", identifier);
            return false;
        };
        if !inner.config.accepts(kind) {
            log::debug!("[Environment] Ignoring {} ({} not enabled)", identifier, kind);
            return false;
        }
        if inner.devices.contains_key(&identifier) {
            return false;
        }
        if !inner.pending.lock().insert(identifier.clone()) {
            return false;
        }

        log::info!("[Environment] Loading {} from {}", identifier, identity.location);
        let added = match Device::load(
            identity,
            kind,
            inner.transport.clone(),
            inner.config.action_timeout(),
        )
        .await
        {
            Ok(device) => self.process_device(Arc::new(device)).await,
            Err(e) => {
                log::warn!("[Environment] Failed to load {}: {}", identifier, e);
                if let Some(discovery) = &inner.discovery {
                    discovery.forget(&identifier);
                }
                false
            }
        };

        inner.pending.lock().remove(&identifier);
        added
    }

    async fn process_device(&self, device: Arc<Device>) -> bool {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return false;
        }

        let identifier = device.identifier().to_string();
        device.set_loss_reporter(inner.loss_tx.clone());
        inner.devices.insert(identifier.clone(), Arc::clone(&device));

        if inner.config.with_subscribers {
            if let Some(target) = device.subscription_target() {
                let host = target.host;
                match inner.registry.register(target) {
                    Ok(()) => {
                        let weak = Arc::downgrade(&device);
                        inner.registry.on(host, BINARY_STATE_PROPERTY, move |_, value| {
                            if let Some(device) = weak.upgrade() {
                                device.apply_event_state(value);
                            }
                        });
                    }
                    Err(e) => log::warn!(
                        "[Environment] Cannot subscribe to {}: {}",
                        device.name(),
                        e
                    ),
                }
            }
        }

        if device.kind().supports_ping() {
            if let Err(e) = device.ping().await {
                // Never announced, so the application hears nothing about it.
                log::warn!("[Environment] Dropping {} before announcing it: {}", identifier, e);
                self.remove_device(&identifier);
                return false;
            }
        }

        let emitter = Arc::clone(&inner.emitter);
        let name = device.name().to_string();
        let id = identifier.clone();
        device.on_state_change(move |state| {
            emitter.emit(DeviceEvent::StateChanged {
                identifier: id.clone(),
                name: name.clone(),
                state,
                timestamp: now_millis(),
            });
        });

        if let Some(callback) = &inner.on_discovered {
            callback(Arc::clone(&device));
        }
        inner.emitter.emit(DeviceEvent::Found {
            identifier,
            name: device.name().to_string(),
            kind: device.kind(),
            host: device.host(),
            timestamp: now_millis(),
        });
        log::info!(
            "[Environment] {} ({}) ready at {}",
            device.name(),
            device.kind(),
            device.host()
        );
        true
    }

    /// Drops a device from the live set.
    ///
    /// Unregisters its lease and makes discovery forget it so the next
    /// search cycle can find it again. Only the first call for a device has
    /// any effect; returns whether this call removed it.
    pub fn device_gone(&self, identifier: &str, reason: LossReason) -> bool {
        let Some(device) = self.remove_device(identifier) else {
            return false;
        };

        log::warn!("[Environment] {} is gone: {}", device.name(), reason);
        self.inner.emitter.emit(DeviceEvent::Gone {
            identifier: identifier.to_string(),
            name: device.name().to_string(),
            reason,
            timestamp: now_millis(),
        });
        true
    }

    /// Removes a device from the live set, its lease and discovery's cache.
    fn remove_device(&self, identifier: &str) -> Option<Arc<Device>> {
        let inner = &self.inner;
        let (_, device) = inner.devices.remove(identifier)?;

        inner.registry.unregister(device.host());
        if let Some(discovery) = &inner.discovery {
            discovery.forget(identifier);
        }
        Some(device)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Friendly names of all live devices, sorted.
    #[must_use]
    pub fn list_devices(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .devices
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// All live devices, sorted by name.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<Arc<Device>> =
            self.inner.devices.iter().map(|d| Arc::clone(d.value())).collect();
        devices.sort_by(|a, b| a.name().cmp(b.name()));
        devices
    }

    #[must_use]
    pub fn device(&self, identifier: &str) -> Option<Arc<Device>> {
        self.inner.devices.get(identifier).map(|d| Arc::clone(d.value()))
    }

    /// Looks a device up by name: exact (case-insensitive) first, then the
    /// first fuzzy match in name order.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Device>> {
        let devices = self.devices();
        devices
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .or_else(|| devices.iter().find(|d| fuzzy_match(name, d.name())))
            .cloned()
    }

    #[must_use]
    pub fn get_by_kind(&self, kind: DeviceKind) -> Vec<Arc<Device>> {
        self.devices()
            .into_iter()
            .filter(|d| d.kind() == kind)
            .collect()
    }

    /// Names of live devices of `kind`, sorted.
    #[must_use]
    pub fn list_kind(&self, kind: DeviceKind) -> Vec<String> {
        self.get_by_kind(kind)
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn discovery(&self) -> Option<&Arc<DiscoveryEngine>> {
        self.inner.discovery.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.inner.config
    }

    /// Shuts down: discovery first, then every lease, then the listener.
    pub async fn stop(&self) {
        let inner = &self.inner;
        inner.cancel.cancel();

        if let Some(discovery) = &inner.discovery {
            discovery.stop();
        }
        inner.registry.unregister_all();
        inner.registry.shutdown().await;

        let tasks: Vec<JoinHandle<()>> = inner.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        log::info!("[Environment] Stopped");
    }
}

/// Case-insensitive subsequence match: every character of `pattern` appears
/// in `candidate` in order (`"dlmp"` matches `"Desk Lamp"`).
#[must_use]
pub fn fuzzy_match(pattern: &str, candidate: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let mut remaining = candidate.chars();
    pattern
        .to_lowercase()
        .chars()
        .all(|p| remaining.by_ref().any(|c| c == p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BinaryState;
    use crate::discovery::ssdp::parse_announcement;
    use crate::test_fixtures::{
        mount_switch, mount_switch_schema, GET_BINARY_STATE_OFF, GET_BINARY_STATE_ON,
        NOTIFY_BINARY_STATE_ON,
    };
    use std::net::SocketAddr;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingEmitter {
        events: Mutex<Vec<DeviceEvent>>,
    }

    impl EventEmitter for RecordingEmitter {
        fn emit(&self, event: DeviceEvent) {
            self.events.lock().push(event);
        }
    }

    impl RecordingEmitter {
        fn count(&self, pred: impl Fn(&DeviceEvent) -> bool) -> usize {
            self.events.lock().iter().filter(|e| pred(e)).count()
        }
    }

    fn config() -> EnvironmentConfig {
        EnvironmentConfig {
            with_discovery: false,
            callback_port_range: (0, 0),
            advertise_ip: Some("127.0.0.1".parse().unwrap()),
            http_timeout_secs: 1,
            http_retry_delay_ms: 10,
            ..Default::default()
        }
    }

    fn announcement(server: &MockServer, usn: &str) -> Announcement {
        let datagram = format!(
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age=86400\r\n\
             LOCATION: {}/setup.xml\r\n\
             ST: upnp:rootdevice\r\n\
             USN: {}\r\n\
             X-User-Agent: redsonic\r\n\r\n",
            server.uri(),
            usn
        );
        let source: SocketAddr = "127.0.0.1:49153".parse().unwrap();
        parse_announcement(datagram.as_bytes(), source).unwrap()
    }

    async fn mount_subscribe(server: &MockServer) {
        Mock::given(method("SUBSCRIBE"))
            .and(header_exists("CALLBACK"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("SID", "uuid:sub-1")
                    .insert_header("TIMEOUT", "Second-1800"),
            )
            .mount(server)
            .await;
    }

    async fn started(config: EnvironmentConfig) -> (Environment, Arc<RecordingEmitter>) {
        let emitter = Arc::new(RecordingEmitter::default());
        let env = Environment::builder(config)
            .emitter(emitter.clone())
            .build()
            .unwrap();
        env.start().await.unwrap();
        (env, emitter)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn announced_switch_is_loaded_once() {
        let server = MockServer::start().await;
        mount_switch(&server).await;
        mount_subscribe(&server).await;
        let (env, emitter) = started(config()).await;

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        assert!(env.handle_announcement(announcement(&server, usn)).await);
        assert_eq!(env.list_devices(), vec!["Desk Lamp"]);

        let device = env.device("Socket-1_0-221234K1").unwrap();
        let output = device
            .invoke("basicevent", "GetBinaryState", &[])
            .unwrap()
            .await
            .unwrap();
        assert!(output.contains_key("BinaryState"));

        // Re-announcement does not change the device set.
        assert!(!env.handle_announcement(announcement(&server, usn)).await);
        assert_eq!(env.devices().len(), 1);
        assert_eq!(
            emitter.count(|e| matches!(e, DeviceEvent::Found { .. })),
            1
        );
        env.stop().await;
    }

    #[tokio::test]
    async fn filtered_kinds_are_ignored() {
        let server = MockServer::start().await;
        let (env, _) = started(EnvironmentConfig {
            device_kinds: vec![DeviceKind::Insight],
            ..config()
        })
        .await;

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        assert!(!env.handle_announcement(announcement(&server, usn)).await);
        assert!(!env
            .handle_announcement(announcement(&server, "uuid:Toaster-1_0-1::upnp:rootdevice"))
            .await);
        assert!(env.list_devices().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
        env.stop().await;
    }

    #[tokio::test]
    async fn notifications_update_state_and_emit_events() {
        let server = MockServer::start().await;
        mount_switch(&server).await;
        mount_subscribe(&server).await;
        let (env, emitter) = started(config()).await;

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        env.handle_announcement(announcement(&server, usn)).await;
        let device = env.get("desk lamp").unwrap();
        assert_eq!(device.state(), BinaryState::Off);

        let host: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(env.registry().handle_notify(host, NOTIFY_BINARY_STATE_ON), 1);
        assert_eq!(device.state(), BinaryState::On);
        assert_eq!(
            emitter.count(|e| matches!(
                e,
                DeviceEvent::StateChanged {
                    state: BinaryState::On,
                    ..
                }
            )),
            1
        );
        env.stop().await;
    }

    #[tokio::test]
    async fn transport_failure_removes_device_exactly_once() {
        let server = MockServer::start().await;
        mount_switch(&server).await;
        mount_subscribe(&server).await;
        let (env, emitter) = started(config()).await;

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        assert!(env.handle_announcement(announcement(&server, usn)).await);
        let host: IpAddr = "127.0.0.1".parse().unwrap();
        wait_for(|| env.registry().lease(host).is_some_and(|l| l.sid.is_some())).await;

        // Every attempt now outlives the per-attempt timeout.
        server.reset().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let device = env.device("Socket-1_0-221234K1").unwrap();
        assert!(device.get_state(true).await.is_err());
        // A second failing call must not produce a second removal.
        assert!(device.get_state(true).await.is_err());

        wait_for(|| env.list_devices().is_empty()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!env.registry().is_registered(host));
        assert_eq!(
            emitter.count(|e| matches!(
                e,
                DeviceEvent::Gone {
                    reason: LossReason::ActionFailed(_),
                    ..
                }
            )),
            1
        );
        assert!(!env.device_gone("Socket-1_0-221234K1", LossReason::PingFailed("late".into())));
        env.stop().await;
    }

    #[tokio::test]
    async fn failed_ping_drops_device_silently() {
        let server = MockServer::start().await;
        mount_switch_schema(&server).await;
        // The initial state query answers; every later one stalls.
        Mock::given(method("POST"))
            .and(body_string_contains("GetBinaryState"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GET_BINARY_STATE_OFF))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;
        mount_subscribe(&server).await;

        let discovered = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = discovered.clone();
        let emitter = Arc::new(RecordingEmitter::default());
        let env = Environment::builder(EnvironmentConfig {
            action_timeout_secs: 1,
            ..config()
        })
        .emitter(emitter.clone())
        .on_discovered(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .build()
        .unwrap();
        env.start().await.unwrap();

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        assert!(!env.handle_announcement(announcement(&server, usn)).await);
        assert!(env.list_devices().is_empty());
        assert!(!env.registry().is_registered("127.0.0.1".parse().unwrap()));

        // Let the stalled query exhaust its retries and report the loss.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(discovered.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(emitter.events.lock().is_empty());
        env.stop().await;
    }

    #[tokio::test]
    async fn failed_load_is_not_recorded() {
        let server = MockServer::start().await;
        let (env, emitter) = started(EnvironmentConfig {
            http_retries: 1,
            ..config()
        })
        .await;

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        assert!(!env.handle_announcement(announcement(&server, usn)).await);
        assert!(env.list_devices().is_empty());
        assert!(emitter.events.lock().is_empty());

        // Once the device answers, the next announcement succeeds.
        mount_switch(&server).await;
        mount_subscribe(&server).await;
        assert!(env.handle_announcement(announcement(&server, usn)).await);
        env.stop().await;
    }

    #[tokio::test]
    async fn discovered_callback_sees_ready_device() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("GetBinaryState"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GET_BINARY_STATE_ON))
            .mount(&server)
            .await;
        mount_switch(&server).await;
        mount_subscribe(&server).await;

        let seen: Arc<Mutex<Vec<(String, BinaryState)>>> = Arc::default();
        let sink = seen.clone();
        let env = Environment::builder(config())
            .emitter(Arc::new(crate::events::NoopEventEmitter))
            .on_discovered(move |device| {
                sink.lock().push((device.name().to_string(), device.state()))
            })
            .build()
            .unwrap();
        env.start().await.unwrap();

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        env.handle_announcement(announcement(&server, usn)).await;
        assert_eq!(*seen.lock(), vec![("Desk Lamp".to_string(), BinaryState::On)]);
        assert_eq!(env.list_kind(DeviceKind::Switch), vec!["Desk Lamp"]);
        assert!(env.get_by_kind(DeviceKind::Insight).is_empty());
        env.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_leases_and_listener() {
        let server = MockServer::start().await;
        mount_switch(&server).await;
        mount_subscribe(&server).await;
        let (env, _) = started(config()).await;
        assert!(env.registry().listener_port().is_some());

        let usn = "uuid:Socket-1_0-221234K1::upnp:rootdevice";
        env.handle_announcement(announcement(&server, usn)).await;
        env.stop().await;

        assert!(env.registry().registered_hosts().is_empty());
        assert_eq!(env.registry().listener_port(), None);
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let result = Environment::builder(EnvironmentConfig {
            device_kinds: vec![],
            ..config()
        })
        .build();
        assert!(result.is_err());
    }

    #[test]
    fn fuzzy_matching_is_an_ordered_subsequence() {
        assert!(fuzzy_match("dlmp", "Desk Lamp"));
        assert!(fuzzy_match("DESK", "Desk Lamp"));
        assert!(fuzzy_match("", "Desk Lamp"));
        assert!(!fuzzy_match("pmld", "Desk Lamp"));
        assert!(!fuzzy_match("desk lamps", "Desk Lamp"));
    }
}
