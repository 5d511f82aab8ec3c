//! Producer side of the notification queue.

use listsync_api::Notification;
use std::sync::Arc;

use crate::backend::QueueBackend;
use crate::error::TransportResult;

/// Queue shared by the webhook receiver and the reconciliation workers.
pub const QUEUE_NAME: &str = "sharepointlistwebhookevent";

/// Name of the queue that receives undecodable messages from `queue`.
pub fn poison_queue_name(queue: &str) -> String {
    format!("{queue}-poison")
}

/// Serializes notifications onto a queue.
#[derive(Clone)]
pub struct NotificationEnqueuer {
    backend: Arc<dyn QueueBackend>,
}

impl NotificationEnqueuer {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    /// Append `notification` to `queue`, creating the queue if absent.
    ///
    /// No retry is attempted; a transport failure is returned to the caller.
    pub async fn enqueue(&self, queue: &str, notification: &Notification) -> TransportResult<()> {
        let body = serde_json::to_string(notification)?;
        if self.backend.create_if_not_exists(queue).await? {
            tracing::info!("Created queue {}", queue);
        }
        self.backend.push(queue, body).await?;
        tracing::debug!(
            "Enqueued notification for subscription {} on {}",
            notification.subscription_id,
            queue
        );
        Ok(())
    }
}
