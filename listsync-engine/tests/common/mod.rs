//! Shared fakes for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cursor_store::{CursorRecord, CursorStore, MemoryCursorStore, StoreError, StoreResult};
use listsync_api::token::datetime_to_ticks;
use listsync_api::{
    ChangeFeed, ChangeKind, ChangeRecord, ChangeToken, EntityId, FeedError, ListResource,
    Notification, Page, RenewError, RenewRequest, RunCredential, StaticCredentialProvider,
    SubscriptionRenewer,
};
use listsync_engine::{
    ChangeHandler, EngineBuilder, EngineConfig, FixedClock, HandlerError, HandlerOutcome,
    ReconciliationEngine, ResourceContext,
};
use mockall::mock;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

pub const TENANT: &str = "contoso.sharepoint.com";
pub const ENDPOINT: &str = "https://hooks.example.com/api/webhooks";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
}

/// A change `minutes_ago` before [`now`], with sequence number `seq`.
pub fn change(
    list: Uuid,
    entity: i64,
    minutes_ago: i64,
    seq: i64,
    kind: ChangeKind,
) -> ChangeRecord {
    let ticks = datetime_to_ticks(now() - Duration::minutes(minutes_ago));
    ChangeRecord::new(entity, format!("1;3;{list};{ticks};{seq}"), kind)
}

/// `count` consecutive updates to distinct items, all within the last minute.
pub fn updates(list: Uuid, first_entity: i64, count: usize, first_seq: i64) -> Vec<ChangeRecord> {
    (0..count as i64)
        .map(|i| {
            let ticks = datetime_to_ticks(now() - Duration::seconds(30)) + first_seq + i;
            ChangeRecord::new(
                first_entity + i,
                format!("1;3;{list};{ticks};{}", first_seq + i),
                ChangeKind::Update,
            )
        })
        .collect()
}

pub fn notification(subscription_id: Uuid, list: Uuid, expires_in: Duration) -> Notification {
    Notification {
        subscription_id,
        client_state: None,
        expiration_date_time: now() + expires_in,
        resource: list.to_string(),
        tenant_id: None,
        site_url: "/sites/docs".to_string(),
        web_id: None,
    }
}

/// Feed over an append-only change log, paging the way upstream does.
#[derive(Default)]
pub struct LogFeed {
    log: Mutex<Vec<ChangeRecord>>,
    starts: Mutex<Vec<ChangeToken>>,
    fail_on_call: Mutex<Option<usize>>,
    current: Mutex<Option<ChangeToken>>,
}

impl LogFeed {
    pub fn new(log: Vec<ChangeRecord>) -> Self {
        Self {
            log: Mutex::new(log),
            ..Default::default()
        }
    }

    pub fn append(&self, changes: impl IntoIterator<Item = ChangeRecord>) {
        self.log.lock().extend(changes);
    }

    /// Fail the `call`-th fetch (1-based) with a network error.
    pub fn fail_on_call(&self, call: usize) {
        *self.fail_on_call.lock() = Some(call);
    }

    pub fn set_current(&self, token: ChangeToken) {
        *self.current.lock() = Some(token);
    }

    /// Start tokens of every fetch so far.
    pub fn starts(&self) -> Vec<ChangeToken> {
        self.starts.lock().clone()
    }

    pub fn fetches(&self) -> usize {
        self.starts.lock().len()
    }
}

#[async_trait]
impl ChangeFeed for LogFeed {
    async fn fetch_page(
        &self,
        _credential: &RunCredential,
        _resource: &ListResource,
        start: &ChangeToken,
        page_size: u32,
    ) -> Result<Page, FeedError> {
        let call = {
            let mut starts = self.starts.lock();
            starts.push(start.clone());
            starts.len()
        };
        if *self.fail_on_call.lock() == Some(call) {
            return Err(FeedError::NetworkError("connection reset".to_string()));
        }

        let changes = self
            .log
            .lock()
            .iter()
            .filter(|c| c.change_token.is_after(start))
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(Page::new(changes, page_size))
    }

    async fn current_token(
        &self,
        _credential: &RunCredential,
        _resource: &ListResource,
    ) -> Result<ChangeToken, FeedError> {
        self.current
            .lock()
            .clone()
            .ok_or_else(|| FeedError::ResourceNotFound("list".to_string()))
    }
}

/// Feed returning pre-scripted responses in order, then empty pages.
#[derive(Default)]
pub struct ScriptedFeed {
    responses: Mutex<VecDeque<Result<Vec<ChangeRecord>, FeedError>>>,
    starts: Mutex<Vec<ChangeToken>>,
}

impl ScriptedFeed {
    pub fn new(responses: Vec<Result<Vec<ChangeRecord>, FeedError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            starts: Mutex::new(Vec::new()),
        }
    }

    pub fn fetches(&self) -> usize {
        self.starts.lock().len()
    }

    pub fn starts(&self) -> Vec<ChangeToken> {
        self.starts.lock().clone()
    }
}

#[async_trait]
impl ChangeFeed for ScriptedFeed {
    async fn fetch_page(
        &self,
        _credential: &RunCredential,
        _resource: &ListResource,
        start: &ChangeToken,
        page_size: u32,
    ) -> Result<Page, FeedError> {
        self.starts.lock().push(start.clone());
        match self.responses.lock().pop_front() {
            Some(Ok(changes)) => Ok(Page::new(changes, page_size)),
            Some(Err(e)) => Err(e),
            None => Ok(Page::new(Vec::new(), page_size)),
        }
    }

    async fn current_token(
        &self,
        _credential: &RunCredential,
        _resource: &ListResource,
    ) -> Result<ChangeToken, FeedError> {
        Err(FeedError::InvalidRequest("not scripted".to_string()))
    }
}

/// Handler recording every call, failing for selected items.
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<EntityId>>,
    erroring: HashSet<EntityId>,
    declining: HashSet<EntityId>,
    delay: Option<std::time::Duration>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error for these items.
    pub fn erroring_on(mut self, entities: &[i64]) -> Self {
        self.erroring = entities.iter().map(|&e| EntityId::from(e)).collect();
        self
    }

    /// Return `Fail` for these items.
    pub fn declining(mut self, entities: &[i64]) -> Self {
        self.declining = entities.iter().map(|&e| EntityId::from(e)).collect();
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<EntityId> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChangeHandler for RecordingHandler {
    async fn handle(
        &self,
        change: &ChangeRecord,
        _context: &ResourceContext<'_>,
    ) -> Result<HandlerOutcome, HandlerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(change.entity_id.clone());
        if self.erroring.contains(&change.entity_id) {
            return Err(HandlerError::new(format!("cannot read item {}", change.entity_id)));
        }
        if self.declining.contains(&change.entity_id) {
            return Ok(HandlerOutcome::Fail);
        }
        Ok(HandlerOutcome::Pass)
    }
}

/// Store whose reads or writes fail on demand, delegating to a memory store otherwise.
pub struct FailingStore {
    inner: MemoryCursorStore,
    read_error: Option<fn(Uuid) -> StoreError>,
    fail_writes: bool,
}

impl FailingStore {
    pub fn new(inner: MemoryCursorStore) -> Self {
        Self {
            inner,
            read_error: None,
            fail_writes: false,
        }
    }

    pub fn failing_reads(mut self, error: fn(Uuid) -> StoreError) -> Self {
        self.read_error = Some(error);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

#[async_trait]
impl CursorStore for FailingStore {
    async fn get(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>> {
        match self.read_error {
            Some(error) => Err(error(subscription_id)),
            None => self.inner.get(subscription_id).await,
        }
    }

    async fn upsert(&self, record: CursorRecord) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("write quota exceeded".to_string()));
        }
        self.inner.upsert(record).await
    }

    async fn remove(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>> {
        self.inner.remove(subscription_id).await
    }
}

mock! {
    pub Renewer {}

    #[async_trait]
    impl SubscriptionRenewer for Renewer {
        async fn renew(
            &self,
            request: &RenewRequest,
            credential: &RunCredential,
        ) -> Result<bool, RenewError>;
    }
}

/// A renewer that must never be called.
pub fn no_renewals() -> MockRenewer {
    let mut renewer = MockRenewer::new();
    renewer.expect_renew().never();
    renewer
}

pub fn config() -> EngineConfig {
    EngineConfig::new(TENANT, ENDPOINT)
}

/// Builder wired with an in-memory store, static credentials and a fixed clock.
pub fn builder(
    store: &MemoryCursorStore,
    feed: Arc<dyn ChangeFeed>,
    handler: Arc<dyn ChangeHandler>,
    renewer: MockRenewer,
) -> EngineBuilder {
    builder_with_config(config(), store, feed, handler, renewer)
}

pub fn builder_with_config(
    config: EngineConfig,
    store: &MemoryCursorStore,
    feed: Arc<dyn ChangeFeed>,
    handler: Arc<dyn ChangeHandler>,
    renewer: MockRenewer,
) -> EngineBuilder {
    ReconciliationEngine::builder(config)
        .with_cursor_store(Arc::new(store.clone()))
        .with_change_feed(feed)
        .with_handler(handler)
        .with_renewer(Arc::new(renewer))
        .with_credentials(Arc::new(StaticCredentialProvider::new("token")))
        .with_clock(Arc::new(FixedClock::new(now())))
}
