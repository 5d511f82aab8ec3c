//! Consumer side of the notification queue.

use listsync_api::Notification;
use std::sync::Arc;

use crate::backend::{QueueBackend, QueueMessage};
use crate::enqueuer::poison_queue_name;
use crate::error::TransportResult;

/// A decoded notification together with the claimed message it came from.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification: Notification,
    pub message: QueueMessage,
}

/// Claims and decodes notifications from one queue.
#[derive(Clone)]
pub struct NotificationConsumer {
    backend: Arc<dyn QueueBackend>,
    queue: String,
    poison_queue: String,
}

impl NotificationConsumer {
    pub fn new(backend: Arc<dyn QueueBackend>, queue: impl Into<String>) -> Self {
        let queue = queue.into();
        Self {
            poison_queue: poison_queue_name(&queue),
            backend,
            queue,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Create the queue if needed and restore messages left in flight by a previous run.
    pub async fn prepare(&self) -> TransportResult<usize> {
        self.backend.create_if_not_exists(&self.queue).await?;
        self.backend.recover(&self.queue).await
    }

    /// Claim the next decodable notification.
    ///
    /// Messages that do not decode are moved to the poison queue and skipped.
    pub async fn next(&self) -> TransportResult<Option<Delivery>> {
        loop {
            let Some(message) = self.backend.pop(&self.queue).await? else {
                return Ok(None);
            };

            match serde_json::from_str::<Notification>(&message.body) {
                Ok(notification) => {
                    return Ok(Some(Delivery {
                        notification,
                        message,
                    }))
                }
                Err(e) => {
                    tracing::warn!(
                        "Moving undecodable message {} to {}: {}",
                        message.id,
                        self.poison_queue,
                        e
                    );
                    self.backend.create_if_not_exists(&self.poison_queue).await?;
                    self.backend
                        .push(&self.poison_queue, message.body.clone())
                        .await?;
                    self.backend.complete(&self.queue, &message).await?;
                }
            }
        }
    }

    /// Delete a processed delivery from the queue.
    pub async fn complete(&self, delivery: &Delivery) -> TransportResult<()> {
        self.backend.complete(&self.queue, &delivery.message).await
    }

    /// Release a delivery for redelivery.
    pub async fn abandon(&self, delivery: &Delivery) -> TransportResult<()> {
        self.backend.abandon(&self.queue, &delivery.message).await
    }
}
