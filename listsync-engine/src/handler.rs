//! The per-change extension point.
//!
//! The engine hands each deduplicated Add/Update change to a [`ChangeHandler`]. What the
//! handler does with it (extract content, index, tag) is outside the engine's concern.
//! Handlers must be idempotent: after a failed run the same changes are replayed.

use async_trait::async_trait;
use listsync_api::{ChangeRecord, RunCredential};
use uuid::Uuid;

/// Where a change happened, plus the run's credential for calling back upstream.
#[derive(Debug, Clone, Copy)]
pub struct ResourceContext<'a> {
    /// Absolute URL of the site holding the list
    pub site_url: &'a str,
    pub resource_id: Uuid,
    pub subscription_id: Uuid,
    pub credential: &'a RunCredential,
}

/// Result of handling one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The change was processed
    Pass,
    /// The handler declined or could not process the change
    Fail,
}

/// Error raised by a handler for a single change.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn handle(
        &self,
        change: &ChangeRecord,
        context: &ResourceContext<'_>,
    ) -> Result<HandlerOutcome, HandlerError>;
}

/// Handler that only logs each change.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl ChangeHandler for LoggingHandler {
    async fn handle(
        &self,
        change: &ChangeRecord,
        context: &ResourceContext<'_>,
    ) -> Result<HandlerOutcome, HandlerError> {
        tracing::info!(
            "{:?} of item {} in list {} ({})",
            change.kind,
            change.entity_id,
            context.resource_id,
            context.site_url
        );
        Ok(HandlerOutcome::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listsync_api::ChangeKind;
    use std::error::Error;

    #[test]
    fn test_handler_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let error = HandlerError::with_source("could not store rendition", io);
        assert_eq!(error.to_string(), "could not store rendition");
        assert_eq!(error.source().map(|s| s.to_string()).as_deref(), Some("disk full"));

        assert!(HandlerError::new("nope").source().is_none());
    }

    #[tokio::test]
    async fn test_logging_handler_passes() {
        let credential = RunCredential::new("token", None);
        let context = ResourceContext {
            site_url: "https://contoso.sharepoint.com/sites/docs",
            resource_id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            credential: &credential,
        };
        let change = ChangeRecord::new(7i64, "1;3;a;1;1", ChangeKind::Update);

        let outcome = LoggingHandler.handle(&change, &context).await.unwrap();
        assert_eq!(outcome, HandlerOutcome::Pass);
    }
}
