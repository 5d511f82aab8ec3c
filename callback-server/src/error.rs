//! Error types for the webhook server.

/// Errors starting the webhook server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("No available port found in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("Server failed to start")]
    StartupFailed,
}
