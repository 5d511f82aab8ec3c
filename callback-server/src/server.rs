//! HTTP server for receiving webhook notifications.

use listsync_api::NotificationBatch;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use tokio::sync::mpsc;
use warp::Filter;

use crate::error::ServerError;
use crate::receiver::WebhookReceiver;

/// Path upstream posts notifications to.
pub const WEBHOOK_PATH: &str = "/api/webhooks";

/// HTTP server for the webhook endpoint.
///
/// The server binds to a local port and serves `POST /api/webhooks`. Subscription
/// validation requests are answered inline; notification batches are passed to the
/// [`WebhookReceiver`].
pub struct WebhookServer {
    /// The port the server is bound to
    port: u16,
    /// Base URL the server is reachable at
    base_url: String,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl WebhookServer {
    /// Create and start a server on all interfaces.
    ///
    /// Binds to the first available port in `port_range` (inclusive). The base URL
    /// uses the host's outbound IP address, falling back to loopback.
    pub async fn new(
        port_range: (u16, u16),
        receiver: WebhookReceiver,
    ) -> Result<Self, ServerError> {
        Self::bind(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port_range, receiver).await
    }

    /// Create and start a server on a specific address.
    pub async fn bind(
        ip: IpAddr,
        port_range: (u16, u16),
        receiver: WebhookReceiver,
    ) -> Result<Self, ServerError> {
        let port = Self::find_available_port(ip, port_range.0, port_range.1).ok_or(
            ServerError::NoAvailablePort {
                start: port_range.0,
                end: port_range.1,
            },
        )?;

        let host = if ip.is_unspecified() {
            Self::detect_local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        } else {
            ip
        };
        let base_url = format!("http://{host}:{port}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let server_handle =
            Self::start_server(SocketAddr::new(ip, port), receiver, shutdown_rx, ready_tx);

        ready_rx.recv().await.ok_or(ServerError::StartupFailed)?;

        Ok(Self {
            port,
            base_url,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Base URL of the server, `http://<ip>:<port>`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the webhook endpoint.
    pub fn webhook_url(&self) -> String {
        format!("{}{}", self.base_url, WEBHOOK_PATH)
    }

    /// Get the port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shutdown the server gracefully, waiting for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        tracing::info!("Webhook server on port {} stopped", self.port);
    }

    /// Find an available port in the given range.
    fn find_available_port(ip: IpAddr, start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(ip, port))
    }

    /// Check if a port is available for binding.
    fn is_port_available(ip: IpAddr, port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(ip, port)).is_ok()
    }

    /// Detect the local IP address used for outbound connections.
    ///
    /// Connecting a UDP socket sends no data; it only resolves the route.
    fn detect_local_ip() -> Option<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }

    /// Start the HTTP server on the given address.
    fn start_server(
        addr: SocketAddr,
        receiver: WebhookReceiver,
        mut shutdown_rx: mpsc::Receiver<()>,
        ready_tx: mpsc::Sender<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let webhook_route = warp::path!("api" / "webhooks")
                .and(warp::post())
                .and(warp::query::<HashMap<String, String>>())
                .and(warp::body::bytes())
                .and_then(move |query: HashMap<String, String>, body: bytes::Bytes| {
                    let receiver = receiver.clone();
                    async move { handle_webhook(receiver, query, body).await }
                });

            let routes = webhook_route.recover(handle_rejection);

            let bound = warp::serve(routes).try_bind_with_graceful_shutdown(addr, async move {
                shutdown_rx.recv().await;
            });
            let (bound, server) = match bound {
                Ok(bound) => bound,
                Err(e) => {
                    // Dropping ready_tx reports the failure to the caller.
                    tracing::error!("Webhook server failed to bind {}: {}", addr, e);
                    return;
                }
            };

            tracing::info!("Webhook server listening on {}", bound);
            let _ = ready_tx.send(()).await;
            server.await;
        })
    }
}

/// Find the subscription validation token, whatever the parameter's casing.
fn validation_token(query: &HashMap<String, String>) -> Option<&str> {
    query
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("validationtoken"))
        .map(|(_, value)| value.as_str())
}

async fn handle_webhook(
    receiver: WebhookReceiver,
    query: HashMap<String, String>,
    body: bytes::Bytes,
) -> Result<warp::reply::Response, warp::Rejection> {
    use warp::Reply;

    if let Some(token) = validation_token(&query) {
        tracing::info!("Answering subscription validation request");
        return Ok(warp::reply::with_status(token.to_string(), warp::http::StatusCode::OK)
            .into_response());
    }

    let batch: NotificationBatch = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Rejecting malformed webhook payload: {}", e);
        warp::reject::custom(MalformedPayload)
    })?;

    match receiver.accept(&batch).await {
        Ok(count) => {
            tracing::debug!("Enqueued {} notification(s) on {}", count, receiver.queue());
            Ok(warp::reply::with_status(String::new(), warp::http::StatusCode::OK)
                .into_response())
        }
        Err(e) => {
            tracing::error!("Failed to enqueue webhook notifications: {}", e);
            Err(warp::reject::custom(EnqueueFailed))
        }
    }
}

/// Custom rejection for bodies that are not a notification batch.
#[derive(Debug)]
struct MalformedPayload;

impl warp::reject::Reject for MalformedPayload {}

/// Custom rejection for queue failures.
#[derive(Debug)]
struct EnqueueFailed;

impl warp::reject::Reject for EnqueueFailed {}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not found";
    } else if err.find::<MalformedPayload>().is_some() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = "Malformed notification payload";
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed";
    } else if err.find::<EnqueueFailed>().is_some() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Failed to enqueue notifications";
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error";
    }

    Ok(warp::reply::with_status(message, code))
}
