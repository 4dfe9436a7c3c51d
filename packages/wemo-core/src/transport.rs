//! Retrying HTTP transport shared by schema fetches, SOAP and GENA.
//!
//! Every request is attempted up to [`RetryPolicy::attempts`] times with a
//! fixed delay between attempts. Callers only see a connection failure once
//! the budget is exhausted.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;

/// Errors surfaced by [`HttpTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Every attempt failed at the connection level.
    #[error("{method} {url} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        method: String,
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// A GET kept answering with a non-success status.
    #[error("GET {url} returned HTTP {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: u16,
        attempts: u32,
    },

    /// A custom method name was not a valid HTTP token.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
}

/// Convenient Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Attempt budget applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no delay.
    #[must_use]
    pub fn once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Returns a header value as text, if present and valid ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Retrying HTTP client.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Creates a transport with a per-attempt timeout.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client, retry })
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetches `url`. Non-success statuses are retried like connection errors.
    pub async fn get(&self, url: &str) -> TransportResult<HttpResponse> {
        self.execute(Method::GET, url, &[], None, true).await
    }

    /// Posts `body` to `url`. Any status is returned to the caller.
    pub async fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: String,
    ) -> TransportResult<HttpResponse> {
        self.execute(Method::POST, url, headers, Some(&body), false)
            .await
    }

    /// Sends a request with an arbitrary method name (e.g. `SUBSCRIBE`).
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, String)],
    ) -> TransportResult<HttpResponse> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(method.to_string()))?;
        self.execute(method, url, headers, None, false).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, String)],
        body: Option<&str>,
        retry_on_status: bool,
    ) -> TransportResult<HttpResponse> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut request = self.client.request(method.clone(), url);
            for (name, value) in headers {
                request = request.header(*name, value.as_str());
            }
            if let Some(body) = body {
                request = request.body(body.to_string());
            }

            let outcome = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    response.text().await.map(|body| HttpResponse {
                        status,
                        headers,
                        body,
                    })
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(response) if retry_on_status && !response.is_success() => {
                    if attempt >= attempts {
                        return Err(TransportError::Status {
                            url: url.to_string(),
                            status: response.status.as_u16(),
                            attempts,
                        });
                    }
                    log::warn!(
                        "[Transport] {} {} returned {} (attempt {}/{})",
                        method,
                        url,
                        response.status,
                        attempt,
                        attempts
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt >= attempts {
                        return Err(TransportError::Exhausted {
                            method: method.to_string(),
                            url: url.to_string(),
                            attempts,
                            source: e,
                        });
                    }
                    log::warn!(
                        "[Transport] {} {} failed (attempt {}/{}): {}",
                        method,
                        url,
                        attempt,
                        attempts,
                        e
                    );
                }
            }

            tokio::time::sleep(self.retry.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(attempts: u32) -> HttpTransport {
        HttpTransport::new(
            Duration::from_secs(2),
            RetryPolicy {
                attempts,
                delay: Duration::ZERO,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn get_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/setup.xml"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/setup.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<root/>"))
            .mount(&server)
            .await;

        let response = transport(3)
            .get(&format!("{}/setup.xml", server.uri()))
            .await
            .unwrap();
        assert_eq!(response.body, "<root/>");
    }

    #[tokio::test]
    async fn get_gives_up_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let err = transport(3)
            .get(&format!("{}/missing.xml", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Status {
                status: 404,
                attempts: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn post_returns_error_status_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("fault"))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(3)
            .post(&server.uri(), &[], "<x/>".to_string())
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body, "fault");
    }

    #[tokio::test]
    async fn custom_method_carries_headers() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .and(header("NT", "upnp:event"))
            .respond_with(ResponseTemplate::new(200).insert_header("SID", "uuid:abc"))
            .mount(&server)
            .await;

        let response = transport(1)
            .request("SUBSCRIBE", &server.uri(), &[("NT", "upnp:event".to_string())])
            .await
            .unwrap();
        assert_eq!(response.header("sid"), Some("uuid:abc"));
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_budget() {
        // Port 9 on loopback is the discard service and is closed in test environments.
        let err = transport(2)
            .get("http://127.0.0.1:9/setup.xml")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Exhausted { attempts: 2, .. }));
    }

    #[test]
    fn invalid_method_is_rejected() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt
            .block_on(transport(1).request("BAD METHOD", "http://127.0.0.1:9", &[]))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidMethod(_)));
    }
}
