//! GENA HTTP client for subscription operations.
//!
//! Handles the HTTP protocol aspects of GENA subscriptions. Lease state and
//! scheduling live in [`Lease`](super::Lease).

use reqwest::StatusCode;

use crate::protocol_constants::GENA_FALLBACK_TIMEOUT_SECS;
use crate::transport::{HttpResponse, HttpTransport};

use super::{SubscriptionError, SubscriptionResult};

/// Response from a successful SUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    /// The subscription ID returned by the device.
    pub sid: String,
    /// The granted lease in seconds.
    pub timeout_secs: u64,
}

/// Outcome of a renewal SUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    /// The device accepted the renewal. `sid` is `None` when the response
    /// did not carry one, which means the current SID stays valid.
    Renewed {
        sid: Option<String>,
        timeout_secs: u64,
    },
    /// The device no longer knows the SID (HTTP 412).
    Rejected,
}

/// HTTP client for GENA (UPnP eventing) operations.
#[derive(Clone)]
pub struct GenaClient {
    transport: HttpTransport,
}

impl GenaClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Extracts the granted lease from a `TIMEOUT: Second-N` header.
    fn extract_timeout_secs(response: &HttpResponse) -> u64 {
        response
            .header("timeout")
            .and_then(|v| v.trim().strip_prefix("Second-"))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(GENA_FALLBACK_TIMEOUT_SECS)
    }

    fn extract_sid(response: &HttpResponse) -> Option<String> {
        response
            .header("sid")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Sends a SUBSCRIBE request to create a new subscription.
    ///
    /// # Arguments
    /// * `event_url` - The service's event subscription URL
    /// * `callback_url` - URL where NOTIFY events should be sent
    /// * `timeout_secs` - Requested lease duration
    pub async fn subscribe(
        &self,
        event_url: &str,
        callback_url: &str,
        timeout_secs: u64,
    ) -> SubscriptionResult<SubscribeResponse> {
        let headers = [
            ("CALLBACK", format!("<{}>", callback_url)),
            ("NT", "upnp:event".to_string()),
            ("TIMEOUT", format!("Second-{}", timeout_secs)),
        ];
        let response = self
            .transport
            .request("SUBSCRIBE", event_url, &headers)
            .await?;

        if !response.is_success() {
            return Err(SubscriptionError::Rejected {
                url: event_url.to_string(),
                status: response.status.as_u16(),
            });
        }

        let sid = Self::extract_sid(&response)
            .ok_or_else(|| SubscriptionError::MissingSid(event_url.to_string()))?;

        Ok(SubscribeResponse {
            sid,
            timeout_secs: Self::extract_timeout_secs(&response),
        })
    }

    /// Sends a SUBSCRIBE request carrying `sid` to renew a lease.
    pub async fn renew(
        &self,
        event_url: &str,
        sid: &str,
        timeout_secs: u64,
    ) -> SubscriptionResult<RenewOutcome> {
        let headers = [
            ("SID", sid.to_string()),
            ("TIMEOUT", format!("Second-{}", timeout_secs)),
        ];
        let response = self
            .transport
            .request("SUBSCRIBE", event_url, &headers)
            .await?;

        if response.status == StatusCode::PRECONDITION_FAILED {
            return Ok(RenewOutcome::Rejected);
        }
        if !response.is_success() {
            return Err(SubscriptionError::Rejected {
                url: event_url.to_string(),
                status: response.status.as_u16(),
            });
        }

        Ok(RenewOutcome::Renewed {
            sid: Self::extract_sid(&response),
            timeout_secs: Self::extract_timeout_secs(&response),
        })
    }

    /// Sends an UNSUBSCRIBE request to cancel a subscription.
    ///
    /// Returns `true` if the device acknowledged it. Failures are not errors:
    /// the lease is dropped locally either way.
    pub async fn unsubscribe(&self, event_url: &str, sid: &str) -> bool {
        let headers = [("SID", sid.to_string())];
        match self
            .transport
            .request("UNSUBSCRIBE", event_url, &headers)
            .await
        {
            Ok(response) => response.is_success(),
            Err(e) => {
                log::debug!("[GENA] UNSUBSCRIBE {} failed: {}", event_url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RetryPolicy;
    use std::time::Duration;
    use wiremock::matchers::{header, header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> GenaClient {
        GenaClient::new(HttpTransport::new(Duration::from_secs(2), RetryPolicy::once()).unwrap())
    }

    #[tokio::test]
    async fn subscribe_sends_callback_and_reads_lease() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .and(header("CALLBACK", "<http://192.168.1.10:8300>"))
            .and(header("NT", "upnp:event"))
            .and(header("TIMEOUT", "Second-1800"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("SID", "uuid:sub-1")
                    .insert_header("TIMEOUT", "Second-600"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .subscribe(&server.uri(), "http://192.168.1.10:8300", 1800)
            .await
            .unwrap();
        assert_eq!(
            response,
            SubscribeResponse {
                sid: "uuid:sub-1".into(),
                timeout_secs: 600
            }
        );
    }

    #[tokio::test]
    async fn missing_timeout_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .respond_with(ResponseTemplate::new(200).insert_header("SID", "uuid:sub-1"))
            .mount(&server)
            .await;

        let response = client()
            .subscribe(&server.uri(), "http://192.168.1.10:8300", 1800)
            .await
            .unwrap();
        assert_eq!(response.timeout_secs, GENA_FALLBACK_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn subscribe_without_sid_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client()
            .subscribe(&server.uri(), "http://192.168.1.10:8300", 1800)
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::MissingSid(_)));
    }

    #[tokio::test]
    async fn renew_maps_412_to_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .and(header("SID", "uuid:stale"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let outcome = client()
            .renew(&server.uri(), "uuid:stale", 1800)
            .await
            .unwrap();
        assert_eq!(outcome, RenewOutcome::Rejected);
    }

    #[tokio::test]
    async fn renew_reports_absent_sid_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .and(header_exists("SID"))
            .respond_with(ResponseTemplate::new(200).insert_header("TIMEOUT", "Second-300"))
            .mount(&server)
            .await;

        let outcome = client()
            .renew(&server.uri(), "uuid:sub-1", 1800)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RenewOutcome::Renewed {
                sid: None,
                timeout_secs: 300
            }
        );
    }

    #[tokio::test]
    async fn unsubscribe_reports_acknowledgement() {
        let server = MockServer::start().await;
        Mock::given(method("UNSUBSCRIBE"))
            .and(header("SID", "uuid:sub-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client().unsubscribe(&server.uri(), "uuid:sub-1").await);
        assert!(!client().unsubscribe("http://127.0.0.1:9/", "uuid:sub-1").await);
    }
}
