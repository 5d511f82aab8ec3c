use cursor_store::StoreError;
use listsync_api::{AuthError, FeedError, RenewError};
use notification_queue::TransportError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that abort a reconciliation run or a worker operation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid engine or worker configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The notification does not identify a list
    #[error("Invalid notification for subscription {subscription_id}: {reason}")]
    InvalidNotification { subscription_id: Uuid, reason: String },

    /// Credential acquisition failed
    #[error("Failed to acquire credential: {0}")]
    Auth(#[from] AuthError),

    /// Pulling a page of changes failed
    #[error("Change feed error: {0}")]
    Feed(#[from] FeedError),

    /// Reading or writing the cursor failed
    #[error("Cursor store error: {0}")]
    Store(#[from] StoreError),

    /// Renewal request failed
    #[error("Subscription renewal failed: {0}")]
    Renewal(#[from] RenewError),

    /// Upstream refused to extend the subscription
    #[error("Renewal of subscription {subscription_id} to endpoint {endpoint} was rejected")]
    RenewalRejected { subscription_id: Uuid, endpoint: String },

    /// Queue access failed
    #[error("Queue error: {0}")]
    Transport(#[from] TransportError),

    /// Worker shutdown did not complete cleanly
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
