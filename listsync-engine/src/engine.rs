//! The reconciliation run.
//!
//! One run per notification:
//!
//! 1. Resolve the cursor: the stored token, or a bootstrap token a few minutes in the past.
//! 2. Pull pages from the feed starting at the cursor.
//! 3. Collapse each page to one change per item and drop items already handled this run.
//! 4. Hand each remaining Add/Update change to the handler, isolating failures.
//! 5. Advance the in-memory token past every record seen, handled or not.
//! 6. Repeat from 2 until a short page, then persist the token if it moved.
//! 7. Renew the subscription if it expires within the renewal threshold.
//!
//! A feed error aborts the run before anything is written, so the next notification
//! replays from the last persisted cursor. Handlers must therefore be idempotent.

use cursor_store::{CursorRecord, CursorStore};
use listsync_api::{
    absolute_site_url, ChangeFeed, ChangeToken, CredentialProvider, FeedError, ListResource,
    Notification, RenewRequest, RunCredential, SubscriptionRenewer,
};
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::dedup::RunDeduplicator;
use crate::error::{EngineError, Result};
use crate::handler::{ChangeHandler, HandlerOutcome, LoggingHandler, ResourceContext};
use crate::locks::SubscriptionLocks;
use crate::summary::{RunOutcome, RunSummary};

/// Runs reconciliation for webhook notifications.
///
/// Create one with [`ReconciliationEngine::builder`]. The engine holds no per-run state;
/// it can be shared behind an `Arc` and used from many tasks at once.
pub struct ReconciliationEngine {
    config: EngineConfig,
    store: Arc<dyn CursorStore>,
    feed: Arc<dyn ChangeFeed>,
    renewer: Arc<dyn SubscriptionRenewer>,
    credentials: Arc<dyn CredentialProvider>,
    handler: Arc<dyn ChangeHandler>,
    clock: Arc<dyn Clock>,
    locks: SubscriptionLocks,
}

impl ReconciliationEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reconcile one notification, logging instead of returning any failure.
    ///
    /// A failed run leaves the cursor where it was; the next notification for the
    /// subscription retries the same range.
    pub async fn process_notification(&self, notification: &Notification) -> Option<RunSummary> {
        match self.reconcile(notification).await {
            Ok(summary) => {
                tracing::info!(
                    "Run for subscription {} finished ({:?}): {} page(s), {} change(s), \
                     {} handled, {} failed, cursor written: {}, renewed: {}",
                    summary.subscription_id,
                    summary.outcome,
                    summary.pages,
                    summary.changes_seen,
                    summary.dispatched,
                    summary.handler_failures,
                    summary.cursor_written,
                    summary.renewed
                );
                Some(summary)
            }
            Err(e) => {
                tracing::error!(
                    "Run for subscription {} failed: {}",
                    notification.subscription_id,
                    e
                );
                None
            }
        }
    }

    /// Reconcile one notification.
    pub async fn reconcile(&self, notification: &Notification) -> Result<RunSummary> {
        let subscription_id = notification.subscription_id;
        let resource_id = notification
            .resource_id()
            .map_err(|e| EngineError::InvalidNotification {
                subscription_id,
                reason: format!("resource {:?} is not a list id: {e}", notification.resource),
            })?;

        let _lease = if self.config.serialize_subscriptions {
            Some(self.locks.acquire(subscription_id).await)
        } else {
            None
        };

        let site_url = notification.site_absolute_url(&self.config.tenant_host);
        let credential = self.credentials.acquire(&site_url).await?;
        let resource = ListResource::new(site_url.as_str(), resource_id);

        let stored = self.resolve_cursor(subscription_id).await?;
        let start_token = match &stored {
            Some(record) => record.last_change_token.clone(),
            None => {
                let token = ChangeToken::bootstrap_before(
                    resource_id,
                    self.clock.now(),
                    self.config.bootstrap_lookback,
                );
                tracing::warn!(
                    "No cursor for subscription {}, starting from bootstrap token {}",
                    subscription_id,
                    token
                );
                token
            }
        };

        tracing::info!(
            "Reconciling subscription {} on list {} from {}",
            subscription_id,
            resource_id,
            start_token
        );

        let mut summary = RunSummary::new(subscription_id, start_token.clone());
        let context = ResourceContext {
            site_url: &site_url,
            resource_id,
            subscription_id,
            credential: &credential,
        };

        match self.pull_all(&resource, &context, &mut summary).await {
            Ok(()) => {}
            Err(FeedError::ResourceNotFound(detail)) => {
                tracing::info!(
                    "List {} for subscription {} no longer exists ({}), nothing to do",
                    resource_id,
                    subscription_id,
                    detail
                );
                summary.outcome = RunOutcome::ResourceGone;
                return Ok(summary);
            }
            Err(e) => return Err(e.into()),
        }

        summary.cursor_written = self
            .persist_cursor(subscription_id, resource_id, stored, &summary.end_token)
            .await?;

        summary.renewed = self
            .renew_if_expiring(notification, &site_url, resource_id, &credential)
            .await?;

        Ok(summary)
    }

    /// Record the list's current position for a new subscription.
    ///
    /// Called at subscribe time so the first notification only sees changes made after
    /// the subscription existed.
    pub async fn prime_cursor(
        &self,
        subscription_id: Uuid,
        resource_id: Uuid,
        site_path: &str,
    ) -> Result<CursorRecord> {
        let site_url = absolute_site_url(&self.config.tenant_host, site_path);
        let credential = self.credentials.acquire(&site_url).await?;
        let resource = ListResource::new(site_url.as_str(), resource_id);

        let token = self.feed.current_token(&credential, &resource).await?;
        let record = CursorRecord::new(subscription_id, resource_id, token);
        self.store.upsert(record.clone()).await?;
        tracing::info!(
            "Primed cursor for subscription {} at {}",
            subscription_id,
            record.last_change_token
        );
        Ok(record)
    }

    /// Remove the cursor of a deleted subscription.
    pub async fn forget_subscription(&self, subscription_id: Uuid) -> Result<Option<CursorRecord>> {
        let removed = self.store.remove(subscription_id).await?;
        if removed.is_some() {
            tracing::info!("Removed cursor for subscription {}", subscription_id);
        }
        Ok(removed)
    }

    async fn resolve_cursor(&self, subscription_id: Uuid) -> Result<Option<CursorRecord>> {
        match self.store.get(subscription_id).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Pull and dispatch pages until the feed is exhausted.
    ///
    /// Only `summary.end_token` and the counters are updated; nothing is persisted.
    async fn pull_all(
        &self,
        resource: &ListResource,
        context: &ResourceContext<'_>,
        summary: &mut RunSummary,
    ) -> std::result::Result<(), FeedError> {
        let mut dedup = RunDeduplicator::new();

        loop {
            let page = self
                .feed
                .fetch_page(
                    context.credential,
                    resource,
                    &summary.end_token,
                    self.config.page_size,
                )
                .await?;

            summary.pages += 1;
            summary.changes_seen += page.len();
            tracing::debug!(
                "Page {} for subscription {}: {} change(s)",
                summary.pages,
                context.subscription_id,
                page.len()
            );

            let admitted = dedup.admit(page.changes());
            summary.skipped += page.len() - admitted.len();

            for change in admitted {
                match self.handler.handle(change, context).await {
                    Ok(HandlerOutcome::Pass) => summary.dispatched += 1,
                    Ok(HandlerOutcome::Fail) => {
                        summary.handler_failures += 1;
                        tracing::warn!(
                            "Handler reported failure for item {} in list {}",
                            change.entity_id,
                            context.resource_id
                        );
                    }
                    Err(e) => {
                        summary.handler_failures += 1;
                        tracing::warn!(
                            "Handler failed for item {} in list {}: {}",
                            change.entity_id,
                            context.resource_id,
                            e
                        );
                    }
                }
            }

            if let Some(token) = page.last_token() {
                summary.end_token = token.clone();
            }

            if page.is_last() {
                return Ok(());
            }
        }
    }

    /// Write the end token if it moved. Returns whether the store was written.
    async fn persist_cursor(
        &self,
        subscription_id: Uuid,
        resource_id: Uuid,
        stored: Option<CursorRecord>,
        end_token: &ChangeToken,
    ) -> Result<bool> {
        let record = match stored {
            Some(mut record) => {
                let current = &record.last_change_token;
                if current.as_str().eq_ignore_ascii_case(end_token.as_str()) {
                    return Ok(false);
                }
                if end_token.feed_cmp(current) == Some(Ordering::Less) {
                    tracing::warn!(
                        "Not moving cursor of subscription {} back from {} to {}",
                        subscription_id,
                        current,
                        end_token
                    );
                    return Ok(false);
                }
                record.advance(end_token.clone());
                record
            }
            None => CursorRecord::new(subscription_id, resource_id, end_token.clone()),
        };

        self.store.upsert(record).await?;
        tracing::debug!("Cursor of subscription {} now at {}", subscription_id, end_token);
        Ok(true)
    }

    /// Renew the subscription if it is about to expire. Returns whether it was renewed.
    async fn renew_if_expiring(
        &self,
        notification: &Notification,
        site_url: &str,
        resource_id: Uuid,
        credential: &RunCredential,
    ) -> Result<bool> {
        let now = self.clock.now();
        if !notification.expires_within(now, self.config.renewal_threshold) {
            return Ok(false);
        }

        let new_expiry = now
            .checked_add_months(self.config.renewal_extension())
            .ok_or_else(|| {
                EngineError::Configuration(format!("Renewal extension overflows from {now}"))
            })?;

        let request = RenewRequest {
            resource_url: site_url.to_string(),
            resource_id,
            subscription_id: notification.subscription_id,
            callback_endpoint: self.config.webhook_endpoint.clone(),
            new_expiry,
        };

        tracing::info!(
            "Subscription {} expires at {}, renewing until {}",
            notification.subscription_id,
            notification.expiration_date_time,
            new_expiry
        );

        if self.renewer.renew(&request, credential).await? {
            Ok(true)
        } else {
            Err(EngineError::RenewalRejected {
                subscription_id: notification.subscription_id,
                endpoint: self.config.webhook_endpoint.clone(),
            })
        }
    }
}

/// Builder for a [`ReconciliationEngine`].
///
/// The cursor store, change feed, renewer and credential provider are required. The
/// handler defaults to [`LoggingHandler`] and the clock to [`SystemClock`].
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn CursorStore>>,
    feed: Option<Arc<dyn ChangeFeed>>,
    renewer: Option<Arc<dyn SubscriptionRenewer>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    handler: Arc<dyn ChangeHandler>,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: None,
            feed: None,
            renewer: None,
            credentials: None,
            handler: Arc::new(LoggingHandler),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_change_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_renewer(mut self, renewer: Arc<dyn SubscriptionRenewer>) -> Self {
        self.renewer = Some(renewer);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ChangeHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and assemble the engine.
    pub fn build(self) -> Result<ReconciliationEngine> {
        self.config.validate()?;

        let missing = |what: &str| EngineError::Configuration(format!("{what} is required"));
        Ok(ReconciliationEngine {
            store: self.store.ok_or_else(|| missing("Cursor store"))?,
            feed: self.feed.ok_or_else(|| missing("Change feed"))?,
            renewer: self.renewer.ok_or_else(|| missing("Subscription renewer"))?,
            credentials: self.credentials.ok_or_else(|| missing("Credential provider"))?,
            handler: self.handler,
            clock: self.clock,
            locks: SubscriptionLocks::new(),
            config: self.config,
        })
    }
}
