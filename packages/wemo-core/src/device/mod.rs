//! Capability model: devices, services and actions built from XML schema.
//!
//! [`Device::load`] turns a discovery identity into a ready [`Device`]: it
//! fetches the device description, loads every declared service's SCPD
//! concurrently and runs the initial state query. Actions are looked up by
//! name and invoked through [`Device::invoke`], which returns a
//! [`PendingResult`] immediately.

pub mod description;
pub mod kinds;
pub mod pending;
pub mod service;

pub use description::{ArgumentDirection, DeviceDescription, ServiceEntry};
pub use kinds::{
    normalize_event_value, parse_binary_state, BinaryState, DeviceKind, InsightParams,
};
pub use pending::PendingResult;
pub use service::{Action, ActionCause, ActionError, ActionOutput, Service};

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::discovery::DeviceIdentity;
use crate::events::{LossReason, LossReport};
use crate::protocol_constants::{BASIC_EVENT_SERVICE, BINARY_STATE_PROPERTY, INSIGHT_SERVICE};
use crate::subscription::SubscriptionTarget;
use crate::transport::{HttpTransport, TransportError};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while building a [`Device`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// A description document could not be fetched.
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: TransportError,
    },

    /// A description document could not be parsed.
    #[error("Malformed description at {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// The initial state query failed.
    #[error("Initial state query failed: {0}")]
    InitialState(#[source] ActionError),

    /// The initial state query answered without a usable state.
    #[error("Initial state query of {device} returned no state: {reason}")]
    IncompleteState { device: String, reason: String },
}

/// Requested service or action is not present on a device.
///
/// Raised synchronously by [`Device::invoke`] before any network I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("{device} has no service named {service}")]
    UnknownService { device: String, service: String },

    #[error("{device}: service {service} has no action {action}")]
    UnknownAction {
        device: String,
        service: String,
        action: String,
    },
}

/// Errors from the convenience operations on [`Device`].
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Action(#[from] ActionError),

    /// The device did not answer a liveness check.
    #[error("{device} is unreachable: {reason}")]
    Unreachable { device: String, reason: String },

    /// A response lacked an expected field.
    #[error("{device}: response to {action} has no {field}")]
    MissingField {
        device: String,
        action: String,
        field: String,
    },
}

/// Convenient Result alias for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

// ─────────────────────────────────────────────────────────────────────────────
// Device
// ─────────────────────────────────────────────────────────────────────────────

/// Callback invoked when the cached binary state changes.
pub type StateCallback = Arc<dyn Fn(BinaryState) + Send + Sync>;

/// A loaded WeMo device.
///
/// Services are immutable after [`Device::load`]. Only the cached state,
/// the state listeners and the loss reporter change afterwards.
pub struct Device {
    identity: DeviceIdentity,
    kind: DeviceKind,
    description: DeviceDescription,
    base_url: String,
    services: BTreeMap<String, Service>,
    state: RwLock<BinaryState>,
    state_listeners: RwLock<Vec<StateCallback>>,
    loss_reporter: RwLock<Option<mpsc::UnboundedSender<LossReport>>>,
    transport: HttpTransport,
    action_timeout: Duration,
}

impl Device {
    /// Fetches and parses the device's schema and runs the initial state
    /// query. The device is returned only once all of it has succeeded.
    ///
    /// Devices without a `basicevent#GetBinaryState` action start with an
    /// [`BinaryState::Unknown`] state instead of failing.
    pub async fn load(
        identity: DeviceIdentity,
        kind: DeviceKind,
        transport: HttpTransport,
        action_timeout: Duration,
    ) -> Result<Device, LoadError> {
        let location = identity.location.clone();
        let response = transport
            .get(&location)
            .await
            .map_err(|source| LoadError::Fetch {
                url: location.clone(),
                source,
            })?;
        let mut description = description::parse_device_description(&response.body)
            .map_err(|reason| LoadError::Malformed {
                url: location.clone(),
                reason,
            })?;

        let base_url = description::base_url(&location);
        let entries = std::mem::take(&mut description.services);
        let loaded = try_join_all(
            entries
                .iter()
                .map(|entry| Service::load(entry, &base_url, &transport)),
        )
        .await?;
        description.services = entries;

        let services = loaded.into_iter().map(|s| (s.name.clone(), s)).collect();

        let device = Device {
            identity,
            kind,
            description,
            base_url,
            services,
            state: RwLock::new(BinaryState::Unknown),
            state_listeners: RwLock::new(Vec::new()),
            loss_reporter: RwLock::new(None),
            transport,
            action_timeout,
        };

        if device.has_action(BASIC_EVENT_SERVICE, "GetBinaryState") {
            match device.refresh_state().await {
                Ok(_) => {}
                Err(DeviceError::Action(e)) => return Err(LoadError::InitialState(e)),
                Err(e) => {
                    return Err(LoadError::IncompleteState {
                        device: device.name().to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        } else {
            log::debug!(
                "[Device] {} has no {}#GetBinaryState, state stays unknown",
                device.name(),
                BASIC_EVENT_SERVICE
            );
        }

        log::info!(
            "[Device] Loaded {} ({}, {} service(s))",
            device.name(),
            device.kind,
            device.services.len()
        );
        Ok(device)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity and attributes
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identity.identifier
    }

    #[must_use]
    pub fn host(&self) -> IpAddr {
        self.identity.host
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Friendly name as configured in the WeMo app.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.description.friendly_name
    }

    /// Model description (e.g. `Belkin Plugin Socket 1.0`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.description.model_description
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.description.model_name
    }

    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.description.serial_number
    }

    #[must_use]
    pub fn udn(&self) -> &str {
        &self.description.udn
    }

    #[must_use]
    pub fn firmware_version(&self) -> Option<&str> {
        self.description.firmware_version.as_deref()
    }

    #[must_use]
    pub fn mac_address(&self) -> Option<&str> {
        self.description.mac_address.as_deref()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    #[must_use]
    pub fn list_services(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn has_action(&self, service: &str, action: &str) -> bool {
        self.action(service, action).is_ok()
    }

    /// Looks up an action by service and action name.
    pub fn action(&self, service: &str, action: &str) -> Result<&Action, CapabilityError> {
        let svc = self
            .services
            .get(service)
            .ok_or_else(|| CapabilityError::UnknownService {
                device: self.name().to_string(),
                service: service.to_string(),
            })?;
        svc.action(action)
            .ok_or_else(|| CapabilityError::UnknownAction {
                device: self.name().to_string(),
                service: service.to_string(),
                action: action.to_string(),
            })
    }

    /// Invokes `service#action` with `args` in the background.
    ///
    /// Returns immediately. Unknown services and actions are reported
    /// synchronously; everything else resolves through the handle.
    /// Transport failures are also reported as device loss.
    pub fn invoke(
        &self,
        service: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<PendingResult, CapabilityError> {
        let handle = self.action(service, action)?.clone();
        let args: Vec<(String, String)> = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let (tx, pending) = PendingResult::channel(self.name(), service, action);
        let transport = self.transport.clone();
        let reporter = self.loss_reporter.read().clone();
        let device = self.name().to_string();
        let identifier = self.identity.identifier.clone();
        let host = self.identity.host;
        let service = service.to_string();

        tokio::spawn(async move {
            let result = handle
                .call(&transport, &args)
                .await
                .map_err(|cause| ActionError {
                    device,
                    service,
                    action: handle.name.clone(),
                    cause,
                });

            if let Err(ref e) = result {
                log::warn!("[SOAP] {}", e);
                if e.is_device_loss() {
                    if let Some(reporter) = reporter {
                        let _ = reporter.send(LossReport {
                            identifier,
                            host,
                            reason: LossReason::ActionFailed(e.to_string()),
                        });
                    }
                }
            }

            // Receiver may have been dropped by a caller that stopped waiting.
            let _ = tx.send(result);
        });

        Ok(pending)
    }

    /// Invokes an action and waits up to the configured action timeout.
    pub async fn call(
        &self,
        service: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> DeviceResult<ActionOutput> {
        let pending = self.invoke(service, action, args)?;
        Ok(pending.wait(self.action_timeout).await?)
    }

    /// Describes every service's actions and their arguments.
    #[must_use]
    pub fn explain(&self) -> Explanation {
        Explanation {
            device: self.name().to_string(),
            services: self
                .services
                .values()
                .map(|s| ServiceExplanation {
                    name: s.name.clone(),
                    actions: s
                        .actions
                        .values()
                        .map(|a| {
                            (
                                a.name.clone(),
                                a.arguments.iter().map(|(n, _)| n.clone()).collect(),
                            )
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binary state
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the cached state without any I/O.
    #[must_use]
    pub fn state(&self) -> BinaryState {
        *self.state.read()
    }

    /// Returns the cached state, querying the device if it is unknown or
    /// `force_update` is set.
    pub async fn get_state(&self, force_update: bool) -> DeviceResult<BinaryState> {
        let cached = self.state();
        if !force_update && cached != BinaryState::Unknown {
            return Ok(cached);
        }
        self.refresh_state().await
    }

    /// Queries `GetBinaryState` and updates the cached state.
    pub async fn refresh_state(&self) -> DeviceResult<BinaryState> {
        let output = self
            .call(BASIC_EVENT_SERVICE, "GetBinaryState", &[])
            .await?;
        let raw = output
            .get(BINARY_STATE_PROPERTY)
            .ok_or_else(|| DeviceError::MissingField {
                device: self.name().to_string(),
                action: "GetBinaryState".to_string(),
                field: BINARY_STATE_PROPERTY.to_string(),
            })?;
        let value = normalize_event_value(self.kind, BINARY_STATE_PROPERTY, raw);
        let state = parse_binary_state(&value);
        self.update_state(state);
        Ok(state)
    }

    /// Switches the device on or off.
    pub async fn set_state(&self, on: bool) -> DeviceResult<BinaryState> {
        let value = if on { "1" } else { "0" };
        self.call(
            BASIC_EVENT_SERVICE,
            "SetBinaryState",
            &[(BINARY_STATE_PROPERTY, value)],
        )
        .await?;
        let state = if on { BinaryState::On } else { BinaryState::Off };
        self.update_state(state);
        Ok(state)
    }

    pub async fn on(&self) -> DeviceResult<BinaryState> {
        self.set_state(true).await
    }

    pub async fn off(&self) -> DeviceResult<BinaryState> {
        self.set_state(false).await
    }

    /// Flips the state, querying it first if unknown.
    pub async fn toggle(&self) -> DeviceResult<BinaryState> {
        let current = self.get_state(false).await?;
        self.set_state(!current.is_on()).await
    }

    /// Liveness check: a forced state query, or a description fetch for
    /// devices without a state action.
    pub async fn ping(&self) -> DeviceResult<()> {
        let result = if self.has_action(BASIC_EVENT_SERVICE, "GetBinaryState") {
            self.refresh_state().await.map(|_| ()).map_err(|e| e.to_string())
        } else {
            self.transport
                .get(&self.identity.location)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        };
        result.map_err(|reason| DeviceError::Unreachable {
            device: self.name().to_string(),
            reason,
        })
    }

    /// Registers a callback for cached state changes.
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(BinaryState) + Send + Sync + 'static,
    {
        self.state_listeners.write().push(Arc::new(callback));
    }

    /// Applies a state value received in an event notification.
    pub fn apply_event_state(&self, value: &str) {
        let value = normalize_event_value(self.kind, BINARY_STATE_PROPERTY, value);
        self.update_state(parse_binary_state(&value));
    }

    fn update_state(&self, state: BinaryState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous == state {
            return;
        }
        log::debug!("[Device] {} state {} -> {}", self.name(), previous, state);
        let listeners: Vec<StateCallback> = self.state_listeners.read().clone();
        for listener in listeners {
            listener(state);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Kind-specific helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetches and decodes Insight telemetry.
    pub async fn insight_params(&self) -> DeviceResult<InsightParams> {
        let output = self.call(INSIGHT_SERVICE, "GetInsightParams", &[]).await?;
        output
            .get("InsightParams")
            .and_then(|raw| InsightParams::parse(raw))
            .ok_or_else(|| DeviceError::MissingField {
                device: self.name().to_string(),
                action: "GetInsightParams".to_string(),
                field: "InsightParams".to_string(),
            })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wiring
    // ─────────────────────────────────────────────────────────────────────────

    /// Routes transport failures of future invocations to `reporter`.
    pub(crate) fn set_loss_reporter(&self, reporter: mpsc::UnboundedSender<LossReport>) {
        *self.loss_reporter.write() = Some(reporter);
    }

    /// Event subscription target, if the device publishes `basicevent` events.
    #[must_use]
    pub fn subscription_target(&self) -> Option<SubscriptionTarget> {
        let service = self.services.get(BASIC_EVENT_SERVICE)?;
        Some(SubscriptionTarget {
            identifier: self.identity.identifier.clone(),
            name: self.name().to_string(),
            host: self.identity.host,
            event_url: service.event_sub_url.clone(),
        })
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("identifier", &self.identity.identifier)
            .field("name", &self.description.friendly_name)
            .field("kind", &self.kind)
            .field("host", &self.identity.host)
            .field("state", &self.state())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Introspection
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only summary of a device's capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub device: String,
    pub services: Vec<ServiceExplanation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceExplanation {
    pub name: String,
    /// Action name and declared argument names.
    pub actions: Vec<(String, Vec<String>)>,
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for service in &self.services {
            writeln!(f, "{}", service.name)?;
            writeln!(f, "{}", "-".repeat(service.name.len()))?;
            for (action, args) in &service.actions {
                writeln!(f, "  {}({})", action, args.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
