//! Embedded HTTP listener receiving GENA NOTIFY callbacks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{connect_info::ConnectInfo, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::protocol_constants::CALLBACK_OK_BODY;

use super::{SubscriptionError, SubscriptionResult};

/// Receives `(source, body)` for every inbound notification.
pub(crate) type NotifySink = Arc<dyn Fn(IpAddr, &str) + Send + Sync>;

/// A running listener. Dropping it without [`shutdown`](Self::shutdown)
/// aborts the server task.
pub(crate) struct CallbackListener {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Binds within `port_range` on the wildcard address of the advertise
    /// IP's family and starts serving.
    pub async fn start(
        advertise_ip: IpAddr,
        port_range: (u16, u16),
        sink: NotifySink,
    ) -> SubscriptionResult<Self> {
        let bind_ip = wildcard_for(advertise_ip);
        let (port, listener) = find_available_port(bind_ip, port_range).await?;
        log::info!(
            "[GENA] Callback listener on {}",
            SocketAddr::new(bind_ip, port)
        );

        let app = Router::new()
            .fallback(handle_callback)
            .layer(TraceLayer::new_for_http())
            .with_state(sink);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                log::error!("[GENA] Callback listener failed: {}", e);
            }
        });

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stops accepting connections and waits for the server task to end.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        log::info!("[GENA] Callback listener on port {} closed", self.port);
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Wildcard address to listen on for callbacks advertised at `advertise_ip`.
///
/// An IPv6 advertise address binds `[::]`, which also accepts IPv4 peers as
/// mapped addresses on dual-stack hosts.
fn wildcard_for(advertise_ip: IpAddr) -> IpAddr {
    match advertise_ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// Binds the first free port of `range`, starting at a per-process offset so
/// that several processes on one host spread over the range. `(0, 0)` binds
/// an ephemeral port.
async fn find_available_port(
    ip: IpAddr,
    (start, end): (u16, u16),
) -> SubscriptionResult<(u16, TcpListener)> {
    let bind_error = |reason: String| SubscriptionError::ListenerBind { start, end, reason };

    if start == 0 && end == 0 {
        let listener = TcpListener::bind(SocketAddr::new(ip, 0))
            .await
            .map_err(|e| bind_error(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| bind_error(e.to_string()))?
            .port();
        return Ok((port, listener));
    }

    let span = u32::from(end.saturating_sub(start)) + 1;
    let offset = std::process::id() % span;
    for i in 0..span {
        let port = start + ((offset + i) % span) as u16;
        let addr = SocketAddr::new(ip, port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(bind_error("no free port".to_string()))
}

/// Accepts any method on any path and always answers 200.
async fn handle_callback(
    State(sink): State<NotifySink>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    body: Bytes,
) -> impl IntoResponse {
    if method == Method::POST || method.as_str() == "NOTIFY" {
        let text = String::from_utf8_lossy(&body);
        sink(addr.ip().to_canonical(), &text);
    } else {
        log::debug!("[GENA] Ignoring {} from {}", method, addr);
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html")],
        CALLBACK_OK_BODY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn forwards_body_and_source_and_always_answers_ok() {
        let seen: Arc<Mutex<Vec<(IpAddr, String)>>> = Arc::default();
        let sink_seen = seen.clone();
        let sink: NotifySink = Arc::new(move |ip, body| sink_seen.lock().push((ip, body.into())));

        let listener = CallbackListener::start(LOOPBACK, (0, 0), sink).await.unwrap();
        let url = format!("http://127.0.0.1:{}/any/path", listener.port());

        let response = reqwest::Client::new()
            .request(Method::from_bytes(b"NOTIFY").unwrap(), &url)
            .body("<e:propertyset/>")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), CALLBACK_OK_BODY);

        let response = reqwest::Client::new().get(&url).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            *seen.lock(),
            vec![("127.0.0.1".parse().unwrap(), "<e:propertyset/>".to_string())]
        );
        listener.shutdown().await;
    }

    #[tokio::test]
    async fn binds_within_range() {
        let (port, _listener) = find_available_port(wildcard_for(LOOPBACK), (38_300, 38_310))
            .await
            .unwrap();
        assert!((38_300..=38_310).contains(&port));
    }

    #[test]
    fn listens_in_the_advertised_family() {
        assert_eq!(wildcard_for(LOOPBACK), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(
            wildcard_for("fd00::5".parse().unwrap()),
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        );
    }
}
