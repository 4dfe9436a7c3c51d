//! Subscription registry: one lease and one renewal task per device host.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::context::NetworkContext;
use crate::events::{LossReason, LossReport};
use crate::transport::HttpTransport;

use super::callbacks::{CallbackTable, ListenerId, PropertyCallback};
use super::gena_client::GenaClient;
use super::lease::{Lease, LeasePolicy, LeaseState};
use super::listener::{CallbackListener, NotifySink};
use super::notify::parse_property_set;
use super::{SubscriptionError, SubscriptionResult};

/// What the registry needs to know about a device to subscribe to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTarget {
    pub identifier: String,
    pub name: String,
    pub host: IpAddr,
    pub event_url: String,
}

struct Entry {
    target: SubscriptionTarget,
    lease: Lease,
    generation: u64,
    task: JoinHandle<()>,
}

struct RegistryInner {
    client: GenaClient,
    policy: LeasePolicy,
    network: NetworkContext,
    port_range: (u16, u16),
    entries: Mutex<HashMap<IpAddr, Entry>>,
    callbacks: RwLock<CallbackTable>,
    next_generation: Mutex<u64>,
    loss_reporter: RwLock<Option<mpsc::UnboundedSender<LossReport>>>,
    listener: Mutex<Option<CallbackListener>>,
}

/// Keeps GENA leases alive and dispatches inbound notifications.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new(
        transport: HttpTransport,
        policy: LeasePolicy,
        network: NetworkContext,
        port_range: (u16, u16),
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                client: GenaClient::new(transport),
                policy,
                network,
                port_range,
                entries: Mutex::new(HashMap::new()),
                callbacks: RwLock::new(CallbackTable::default()),
                next_generation: Mutex::new(0),
                loss_reporter: RwLock::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Routes unrecoverable lease failures to `reporter`.
    pub fn set_loss_reporter(&self, reporter: mpsc::UnboundedSender<LossReport>) {
        *self.inner.loss_reporter.write() = Some(reporter);
    }

    /// Starts the callback listener and records its port in the network
    /// context. Returns the bound port. Calling it again is a no-op.
    pub async fn start_listener(&self) -> SubscriptionResult<u16> {
        if let Some(port) = self.listener_port() {
            return Ok(port);
        }

        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let sink: NotifySink = Arc::new(move |source, body| {
            if let Some(inner) = weak.upgrade() {
                SubscriptionRegistry { inner }.handle_notify(source, body);
            }
        });

        let listener = CallbackListener::start(
            self.inner.network.advertise_ip(),
            self.inner.port_range,
            sink,
        )
        .await?;
        let port = listener.port();

        let mut slot = self.inner.listener.lock();
        if let Some(existing) = slot.as_ref() {
            // Lost a race with a concurrent start; keep the first listener.
            return Ok(existing.port());
        }
        *slot = Some(listener);
        self.inner.network.set_port(port);
        Ok(port)
    }

    #[must_use]
    pub fn listener_port(&self) -> Option<u16> {
        self.inner.listener.lock().as_ref().map(CallbackListener::port)
    }

    /// URL sent in CALLBACK headers.
    #[must_use]
    pub fn callback_url(&self) -> String {
        self.inner.network.callback_url()
    }

    /// Starts a lease for `target`, replacing any lease for the same host.
    ///
    /// The first SUBSCRIBE runs in the background; failures surface through
    /// the loss reporter.
    pub fn register(&self, target: SubscriptionTarget) -> SubscriptionResult<()> {
        if self.listener_port().is_none() {
            return Err(SubscriptionError::ListenerNotRunning);
        }

        let host = target.host;
        let lease = Lease::new(host, target.event_url.clone(), self.callback_url());

        let mut entries = self.inner.entries.lock();
        if let Some(previous) = entries.remove(&host) {
            previous.task.abort();
        }

        let generation = {
            let mut next = self.inner.next_generation.lock();
            *next += 1;
            *next
        };

        log::info!(
            "[GENA] Registering {} ({}) at {}",
            target.name,
            host,
            target.event_url
        );
        let task = tokio::spawn(run_lease(self.inner.clone(), lease.clone(), generation));
        entries.insert(
            host,
            Entry {
                target,
                lease,
                generation,
                task,
            },
        );
        Ok(())
    }

    /// Stops the lease and drops every listener for `host`.
    ///
    /// Idempotent; returns `true` if anything was removed. No UNSUBSCRIBE is
    /// sent: the device lets the lease expire.
    pub fn unregister(&self, host: IpAddr) -> bool {
        let entry = self.inner.entries.lock().remove(&host);
        let cleared = self.inner.callbacks.write().clear_host(host);

        match entry {
            Some(entry) => {
                entry.task.abort();
                log::info!("[GENA] Unregistered {} ({})", entry.target.name, host);
                true
            }
            None => cleared > 0,
        }
    }

    /// Unregisters every host.
    pub fn unregister_all(&self) {
        let hosts: Vec<IpAddr> = self.inner.entries.lock().keys().copied().collect();
        for host in hosts {
            self.unregister(host);
        }
    }

    /// Adds a listener for `property` events from `host`.
    ///
    /// Listeners for one key run in registration order.
    pub fn on<F>(&self, host: IpAddr, property: &str, callback: F) -> ListenerId
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let callback: PropertyCallback = Arc::new(callback);
        self.inner.callbacks.write().add(host, property, callback)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.callbacks.write().remove(id)
    }

    /// Snapshot of the lease for `host`.
    #[must_use]
    pub fn lease(&self, host: IpAddr) -> Option<Lease> {
        self.inner.entries.lock().get(&host).map(|e| e.lease.clone())
    }

    #[must_use]
    pub fn is_registered(&self, host: IpAddr) -> bool {
        self.inner.entries.lock().contains_key(&host)
    }

    #[must_use]
    pub fn registered_hosts(&self) -> Vec<IpAddr> {
        let mut hosts: Vec<IpAddr> = self.inner.entries.lock().keys().copied().collect();
        hosts.sort();
        hosts
    }

    /// Dispatches a NOTIFY body from `source` to matching listeners.
    ///
    /// Returns the number of callbacks invoked. Unregistered sources and
    /// malformed bodies are ignored.
    pub fn handle_notify(&self, source: IpAddr, body: &str) -> usize {
        if !self.is_registered(source) {
            log::debug!("[GENA] Ignoring notification from unregistered {}", source);
            return 0;
        }

        let mut invoked = 0;
        for (property, value) in parse_property_set(body) {
            let callbacks = self.inner.callbacks.read().matching(source, &property);
            for (id, callback) in callbacks {
                // A callback may unregister the host or remove other listeners.
                if !self.is_registered(source) || !self.inner.callbacks.read().contains(id) {
                    continue;
                }
                callback(&property, &value);
                invoked += 1;
            }
        }
        invoked
    }

    /// Closes the callback listener.
    pub async fn shutdown(&self) {
        let listener = self.inner.listener.lock().take();
        if let Some(listener) = listener {
            listener.shutdown().await;
        }
    }
}

impl RegistryInner {
    /// Stores the latest lease snapshot. Returns `false` if the entry was
    /// replaced or removed, meaning the task should stop.
    fn store_lease(&self, lease: &Lease, generation: u64) -> bool {
        match self.entries.lock().get_mut(&lease.host) {
            Some(entry) if entry.generation == generation => {
                entry.lease = lease.clone();
                true
            }
            _ => false,
        }
    }

    fn lease_failed(&self, lease: &Lease, generation: u64, error: SubscriptionError) {
        let removed = {
            let mut entries = self.entries.lock();
            let current = entries
                .get(&lease.host)
                .is_some_and(|entry| entry.generation == generation);
            if current {
                entries.remove(&lease.host)
            } else {
                None
            }
        };
        let Some(entry) = removed else {
            return;
        };

        self.callbacks.write().clear_host(lease.host);
        log::warn!(
            "[GENA] Lost subscription for {} ({}): {}",
            entry.target.name,
            lease.host,
            error
        );

        if let Some(reporter) = self.loss_reporter.read().as_ref() {
            let _ = reporter.send(LossReport {
                identifier: entry.target.identifier,
                host: lease.host,
                reason: LossReason::SubscriptionLost(error.to_string()),
            });
        }
    }
}

/// Renewal loop for one lease. Steps never overlap for a host: a new
/// registration aborts the previous task before spawning its own.
async fn run_lease(inner: Arc<RegistryInner>, mut lease: Lease, generation: u64) {
    loop {
        match lease.advance(&inner.client, &inner.policy).await {
            Ok(delay) => {
                if !inner.store_lease(&lease, generation) {
                    return;
                }
                if lease.state == LeaseState::Resubscribing {
                    log::debug!("[GENA] {} confirming in {:?}", lease.host, delay);
                }
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                inner.lease_failed(&lease, generation, e);
                return;
            }
        }
    }
}
