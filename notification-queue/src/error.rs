//! Error types for queue transports.

/// Errors from enqueueing or dequeueing messages.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The queue has not been created
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// The message is not claimed by this consumer
    #[error("Message {message_id} is not in flight on queue {queue}")]
    NotInFlight {
        /// Queue name
        queue: String,
        /// Message ID
        message_id: String,
    },

    /// A message body could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Reading or writing the backing storage failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        TransportError::Serialization(error.to_string())
    }
}

/// Convenience type alias for Results using TransportError.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::QueueNotFound("events".to_string());
        assert_eq!(error.to_string(), "Queue not found: events");

        let error = TransportError::NotInFlight {
            queue: "events".to_string(),
            message_id: "m1".to_string(),
        };
        assert_eq!(error.to_string(), "Message m1 is not in flight on queue events");
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: TransportError = json_error.into();
        assert!(matches!(error, TransportError::Serialization(_)));
    }
}
