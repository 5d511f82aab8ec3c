//! Webhook receiver for list change notifications.
//!
//! This crate provides a small HTTP server that upstream calls whenever a watched list
//! changes. It does no reconciliation itself; every notification in a posted batch is
//! handed to the notification queue for a worker to pick up.
//!
//! # Overview
//!
//! - [`WebhookServer`]: binds to the first free port in a range and serves
//!   `POST /api/webhooks`.
//! - [`WebhookReceiver`]: enqueues each notification of a batch on the shared queue.
//!
//! # Protocol
//!
//! 1. When a subscription is created, upstream posts once with a `validationtoken` query
//!    parameter. The server must answer `200 text/plain` echoing the token.
//! 2. Afterwards, each post carries a JSON body `{"value": [notification, ...]}`. The
//!    server answers `200` once all notifications are enqueued, `400` if the body does not
//!    parse and `500` if the queue rejects a message (upstream retries on non-2xx).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use callback_server::{WebhookReceiver, WebhookServer};
//! use notification_queue::{MemoryQueue, NotificationEnqueuer, QUEUE_NAME};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callback_server::ServerError> {
//!     let enqueuer = NotificationEnqueuer::new(Arc::new(MemoryQueue::new()));
//!     let receiver = WebhookReceiver::new(enqueuer, QUEUE_NAME);
//!
//!     let server = WebhookServer::new((7070, 7080), receiver).await?;
//!     println!("Webhook endpoint: {}", server.webhook_url());
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
pub mod receiver;
mod server;

pub use error::ServerError;
pub use receiver::WebhookReceiver;
pub use server::{WebhookServer, WEBHOOK_PATH};
