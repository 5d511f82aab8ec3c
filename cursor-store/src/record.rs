use chrono::{DateTime, Utc};
use listsync_api::ChangeToken;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Last fully processed feed position of one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    /// Webhook subscription the cursor belongs to
    pub subscription_id: Uuid,
    /// List the subscription watches
    pub resource_id: Uuid,
    /// Token up to which every change has been handed to the handler
    pub last_change_token: ChangeToken,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl CursorRecord {
    /// Create a record stamped with the current time.
    pub fn new(subscription_id: Uuid, resource_id: Uuid, last_change_token: ChangeToken) -> Self {
        Self {
            subscription_id,
            resource_id,
            last_change_token,
            updated_at: Utc::now(),
        }
    }

    /// Replace the token and refresh the timestamp.
    pub fn advance(&mut self, token: ChangeToken) {
        self.last_change_token = token;
        self.updated_at = Utc::now();
    }
}
