//! Error types for the listsync-api crate.

use thiserror::Error;

/// Errors from pulling the change feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The watched list no longer exists upstream
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Connection failure, timeout or an exhausted retry budget
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Upstream answered with an unexpected status
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The response body could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The request was rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FeedError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::NetworkError(_) => true,
            FeedError::Status { status, .. } => *status == 429 || *status == 503,
            _ => false,
        }
    }
}

/// Errors from renewing a webhook subscription.
#[derive(Debug, Error)]
pub enum RenewError {
    /// Connection failure or timeout
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Upstream failed to process the renewal
    #[error("Renewal failed with status {status}: {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The renewal request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors from acquiring a run credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint could not be reached
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The token endpoint refused the client credentials
    #[error("Token request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The token response did not contain a usable access token
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            FeedError::ParseError(error.to_string())
        } else {
            FeedError::NetworkError(error.to_string())
        }
    }
}

impl From<reqwest::Error> for RenewError {
    fn from(error: reqwest::Error) -> Self {
        RenewError::NetworkError(error.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            AuthError::InvalidResponse(error.to_string())
        } else {
            AuthError::NetworkError(error.to_string())
        }
    }
}
