//! Integration tests for the webhook server.
//!
//! These tests start a real HTTP server, send actual HTTP requests,
//! and verify what lands on the queue.

use async_trait::async_trait;
use callback_server::{WebhookReceiver, WebhookServer};
use listsync_api::Notification;
use notification_queue::{
    MemoryQueue, NotificationEnqueuer, QueueBackend, QueueMessage, TransportError,
    TransportResult, QUEUE_NAME,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

const BATCH: &str = r#"{
    "value": [
        {
            "subscriptionId": "91779246-afe9-4525-b122-6c199ae89211",
            "clientState": "00000000-0000-0000-0000-000000000000",
            "expirationDateTime": "2024-04-05T09:27:00.0000000Z",
            "resource": "b9f6f714-9df8-470b-b22e-653855e1c181",
            "tenantId": "00000000-0000-0000-0000-000000000000",
            "siteUrl": "/sites/docs",
            "webId": "1b9ac7a6-0d21-4e66-a2e1-a1c5b4ed3a65"
        },
        {
            "subscriptionId": "3b2f4a2e-7f0f-4c54-9a4c-2f1a8e6c9d10",
            "expirationDateTime": "2024-04-06T09:27:00Z",
            "resource": "0c7d9a3b-5a11-4f3e-8b7c-1d2e3f4a5b6c",
            "siteUrl": "/sites/hr"
        }
    ]
}"#;

async fn start(port_range: (u16, u16)) -> (WebhookServer, MemoryQueue) {
    let queue = MemoryQueue::new();
    let receiver = WebhookReceiver::new(
        NotificationEnqueuer::new(Arc::new(queue.clone())),
        QUEUE_NAME,
    );
    let server = WebhookServer::bind(LOCALHOST, port_range, receiver)
        .await
        .expect("Failed to create webhook server");
    (server, queue)
}

/// A notification batch is enqueued one message per notification, in order.
#[tokio::test]
async fn test_batch_is_enqueued() {
    let (server, queue) = start((53000, 53100)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.webhook_url())
        .header("Content-Type", "application/json")
        .body(BATCH)
        .send()
        .await
        .expect("Failed to send HTTP request");
    assert_eq!(response.status(), 200);

    assert_eq!(queue.len(QUEUE_NAME).await.unwrap(), 2);

    let first = queue.pop(QUEUE_NAME).await.unwrap().unwrap();
    let first: Notification = serde_json::from_str(&first.body).unwrap();
    assert_eq!(first.site_url, "/sites/docs");
    assert_eq!(first.resource, "b9f6f714-9df8-470b-b22e-653855e1c181");

    let second = queue.pop(QUEUE_NAME).await.unwrap().unwrap();
    let second: Notification = serde_json::from_str(&second.body).unwrap();
    assert_eq!(second.site_url, "/sites/hr");
    assert!(second.client_state.is_none());

    server.shutdown().await;
}

/// The validation handshake echoes the token and enqueues nothing.
#[tokio::test]
async fn test_validation_token_is_echoed() {
    let (server, queue) = start((53200, 53300)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}?validationtoken=abc%2D123", server.webhook_url()))
        .body("")
        .send()
        .await
        .expect("Failed to send HTTP request");

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(response.text().await.unwrap(), "abc-123");

    // The queue is only created by the first enqueue.
    assert!(queue.len(QUEUE_NAME).await.is_err());

    server.shutdown().await;
}

/// Bodies that do not parse are rejected with 400.
#[tokio::test]
async fn test_malformed_payload_is_rejected() {
    let (server, queue) = start((53400, 53500)).await;
    let client = reqwest::Client::new();

    for body in ["not json", r#"{"value": [{"subscriptionId": "nope"}]}"#, "{}"] {
        let response = client
            .post(server.webhook_url())
            .body(body)
            .send()
            .await
            .expect("Failed to send HTTP request");
        assert_eq!(response.status(), 400, "body: {body}");
    }
    assert!(queue.len(QUEUE_NAME).await.is_err());

    server.shutdown().await;
}

/// Routing: other paths are 404, other methods on the webhook path are 405.
#[tokio::test]
async fn test_routing() {
    let (server, _queue) = start((53600, 53700)).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/nonexistent", server.base_url()))
        .send()
        .await
        .expect("Failed to connect to server");
    assert_eq!(response.status(), 404);

    let response = client
        .get(server.webhook_url())
        .send()
        .await
        .expect("Failed to connect to server");
    assert_eq!(response.status(), 405);

    server.shutdown().await;
}

struct UnavailableQueue;

#[async_trait]
impl QueueBackend for UnavailableQueue {
    async fn create_if_not_exists(&self, _queue: &str) -> TransportResult<bool> {
        Err(TransportError::Io("connection refused".to_string()))
    }

    async fn push(&self, _queue: &str, _body: String) -> TransportResult<()> {
        Err(TransportError::Io("connection refused".to_string()))
    }

    async fn pop(&self, _queue: &str) -> TransportResult<Option<QueueMessage>> {
        Ok(None)
    }

    async fn complete(&self, _queue: &str, _message: &QueueMessage) -> TransportResult<()> {
        Ok(())
    }

    async fn abandon(&self, _queue: &str, _message: &QueueMessage) -> TransportResult<()> {
        Ok(())
    }

    async fn len(&self, _queue: &str) -> TransportResult<usize> {
        Ok(0)
    }
}

/// A queue failure surfaces as 500 so upstream retries the delivery.
#[tokio::test]
async fn test_transport_failure_is_server_error() {
    let receiver = WebhookReceiver::new(
        NotificationEnqueuer::new(Arc::new(UnavailableQueue)),
        QUEUE_NAME,
    );
    let server = WebhookServer::bind(LOCALHOST, (53800, 53900), receiver)
        .await
        .expect("Failed to create webhook server");

    let response = reqwest::Client::new()
        .post(server.webhook_url())
        .body(BATCH)
        .send()
        .await
        .expect("Failed to send HTTP request");
    assert_eq!(response.status(), 500);

    server.shutdown().await;
}

/// The server reports its address and port.
#[tokio::test]
async fn test_server_url() {
    let (server, _queue) = start((54000, 54100)).await;

    let port = server.port();
    assert!((54000..=54100).contains(&port));
    assert_eq!(server.base_url(), format!("http://127.0.0.1:{port}"));
    assert_eq!(
        server.webhook_url(),
        format!("http://127.0.0.1:{port}/api/webhooks")
    );

    server.shutdown().await;
}
