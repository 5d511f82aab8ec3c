//! Hand-off from the HTTP layer to the notification queue.

use listsync_api::NotificationBatch;
use notification_queue::{NotificationEnqueuer, TransportError};

/// Enqueues every notification of a posted batch.
#[derive(Clone)]
pub struct WebhookReceiver {
    enqueuer: NotificationEnqueuer,
    queue: String,
}

impl WebhookReceiver {
    pub fn new(enqueuer: NotificationEnqueuer, queue: impl Into<String>) -> Self {
        Self {
            enqueuer,
            queue: queue.into(),
        }
    }

    /// Name of the queue notifications are appended to.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Enqueue each notification in order. Stops at the first transport failure.
    ///
    /// Returns the number of notifications enqueued.
    pub async fn accept(&self, batch: &NotificationBatch) -> Result<usize, TransportError> {
        for notification in &batch.value {
            self.enqueuer.enqueue(&self.queue, notification).await?;
        }
        Ok(batch.value.len())
    }
}
