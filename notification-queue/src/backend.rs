//! Queue backend trait and message type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;

/// A message claimed from a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Backend-assigned message ID
    pub id: String,
    /// Encoded payload
    pub body: String,
    /// How many times the message has been handed out, including this time
    pub dequeue_count: u32,
}

/// Named FIFO queues with claim/complete semantics.
///
/// `pop` claims the oldest ready message and hides it from other consumers until it is
/// completed (deleted) or abandoned (made ready again).
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Create the queue if absent. Returns `true` if it was created by this call.
    async fn create_if_not_exists(&self, queue: &str) -> TransportResult<bool>;

    /// Append a message to the queue.
    async fn push(&self, queue: &str, body: String) -> TransportResult<()>;

    /// Claim the oldest ready message, if any.
    async fn pop(&self, queue: &str) -> TransportResult<Option<QueueMessage>>;

    /// Delete a claimed message.
    async fn complete(&self, queue: &str, message: &QueueMessage) -> TransportResult<()>;

    /// Return a claimed message to the queue for redelivery.
    async fn abandon(&self, queue: &str, message: &QueueMessage) -> TransportResult<()>;

    /// Number of ready messages.
    async fn len(&self, queue: &str) -> TransportResult<usize>;

    /// Make messages claimed by a previous, dead process ready again.
    ///
    /// Returns the number of messages recovered.
    async fn recover(&self, _queue: &str) -> TransportResult<usize> {
        Ok(0)
    }
}
