//! Per-host lease state machine.
//!
//! A [`Lease`] is advanced one step at a time by the registry's renewal task.
//! Each step performs at most one SUBSCRIBE (plus an UNSUBSCRIBE after a
//! rejected SID) and returns how long to wait before the next step.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::protocol_constants::GENA_RENEWAL_RATIO;

use super::gena_client::{GenaClient, RenewOutcome};
use super::SubscriptionResult;

/// Lifecycle of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Unregistered,
    Subscribing,
    Subscribed,
    /// The SID changed or was rejected; the next step confirms the new one.
    Resubscribing,
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeaseState::Unregistered => "unregistered",
            LeaseState::Subscribing => "subscribing",
            LeaseState::Subscribed => "subscribed",
            LeaseState::Resubscribing => "resubscribing",
        };
        f.write_str(name)
    }
}

/// Scheduling parameters shared by every lease.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeasePolicy {
    /// Lease duration requested in each SUBSCRIBE.
    pub requested_timeout_secs: u64,
    /// Delay after any SID change.
    pub backoff: Duration,
    /// Fraction of the granted lease to wait before a regular renewal.
    pub renewal_ratio: f64,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            requested_timeout_secs: 1800,
            backoff: Duration::from_secs(1),
            renewal_ratio: GENA_RENEWAL_RATIO,
        }
    }
}

impl LeasePolicy {
    /// Delay before renewing a lease granted for `granted_secs`.
    ///
    /// Never shorter than `backoff`, so a device granting `Second-0` is not
    /// renewed in a tight loop.
    #[must_use]
    pub fn renewal_delay(&self, granted_secs: u64) -> Duration {
        Duration::from_secs_f64(granted_secs as f64 * self.renewal_ratio).max(self.backoff)
    }
}

/// Event lease held with one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub host: IpAddr,
    pub event_url: String,
    pub callback_url: String,
    pub sid: Option<String>,
    /// Last granted lease duration. Zero until the first SUBSCRIBE succeeds.
    pub timeout_secs: u64,
    pub state: LeaseState,
}

impl Lease {
    pub fn new(host: IpAddr, event_url: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            host,
            event_url: event_url.into(),
            callback_url: callback_url.into(),
            sid: None,
            timeout_secs: 0,
            state: LeaseState::Unregistered,
        }
    }

    /// Performs one subscription step and returns the delay before the next.
    ///
    /// | situation                          | next state     | delay      |
    /// |------------------------------------|----------------|------------|
    /// | first SUBSCRIBE                    | Subscribed     | ratio × lease |
    /// | renewal, SID unchanged or absent   | Subscribed     | ratio × lease |
    /// | renewal, new SID                   | Resubscribing  | backoff    |
    /// | renewal rejected (412)             | Resubscribing  | backoff    |
    /// | fresh SUBSCRIBE while Resubscribing| Resubscribing  | backoff    |
    ///
    /// Any error leaves the lease `Unregistered`.
    pub async fn advance(
        &mut self,
        client: &GenaClient,
        policy: &LeasePolicy,
    ) -> SubscriptionResult<Duration> {
        let result = self.step(client, policy).await;
        if result.is_err() {
            self.state = LeaseState::Unregistered;
            self.sid = None;
        }
        result
    }

    async fn step(
        &mut self,
        client: &GenaClient,
        policy: &LeasePolicy,
    ) -> SubscriptionResult<Duration> {
        let Some(sid) = self.sid.clone() else {
            let resubscribing = self.state == LeaseState::Resubscribing;
            if !resubscribing {
                self.state = LeaseState::Subscribing;
            }

            let response = client
                .subscribe(&self.event_url, &self.callback_url, policy.requested_timeout_secs)
                .await?;
            log::info!(
                "[GENA] Subscribed to {} (sid={}, timeout={}s)",
                self.event_url,
                response.sid,
                response.timeout_secs
            );
            self.sid = Some(response.sid);
            self.timeout_secs = response.timeout_secs;

            if resubscribing {
                return Ok(policy.backoff);
            }
            self.state = LeaseState::Subscribed;
            return Ok(policy.renewal_delay(self.timeout_secs));
        };

        match client
            .renew(&self.event_url, &sid, policy.requested_timeout_secs)
            .await?
        {
            RenewOutcome::Renewed {
                sid: Some(new_sid),
                timeout_secs,
            } if new_sid != sid => {
                log::info!(
                    "[GENA] {} replaced sid {} with {}",
                    self.event_url,
                    sid,
                    new_sid
                );
                self.sid = Some(new_sid);
                self.timeout_secs = timeout_secs;
                self.state = LeaseState::Resubscribing;
                Ok(policy.backoff)
            }
            RenewOutcome::Renewed { timeout_secs, .. } => {
                log::debug!("[GENA] Renewed {} (timeout={}s)", sid, timeout_secs);
                self.timeout_secs = timeout_secs;
                self.state = LeaseState::Subscribed;
                Ok(policy.renewal_delay(timeout_secs))
            }
            RenewOutcome::Rejected => {
                log::warn!(
                    "[GENA] {} rejected sid {}, subscribing again",
                    self.event_url,
                    sid
                );
                client.unsubscribe(&self.event_url, &sid).await;
                self.sid = None;
                self.state = LeaseState::Resubscribing;
                Ok(policy.backoff)
            }
        }
    }
}
