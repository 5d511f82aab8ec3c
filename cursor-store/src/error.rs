//! Error types for cursor stores.

use uuid::Uuid;

/// Errors that can occur reading or writing cursors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing storage reports the cursor as absent
    #[error("Cursor not found for subscription {0}")]
    NotFound(Uuid),

    /// Reading or writing the backing storage failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The stored data could not be decoded
    #[error("Corrupt cursor data: {0}")]
    Corrupt(String),

    /// The backing storage is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the error only means "no cursor recorded".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Corrupt(error.to_string())
    }
}

/// Convenience type alias for Results using StoreError.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
