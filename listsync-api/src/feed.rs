//! Change feed client.
//!
//! The feed is read one page at a time: each request carries the continuation token to
//! start from and the maximum number of changes to return. Pages must be pulled in
//! sequence since the next start token depends on the previous page.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::auth::RunCredential;
use crate::change::{ChangeKind, ChangeQuery, ChangeRecord, EntityId, ListResource, Page};
use crate::error::FeedError;
use crate::retry::RetryPolicy;
use crate::token::ChangeToken;

const ACCEPT_JSON: &str = "application/json;odata=nometadata";

/// Default per-request timeout so a hung call surfaces as a `FeedError`.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of item-level changes for a list.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Fetch up to `page_size` changes after `start`, in feed order.
    async fn fetch_page(
        &self,
        credential: &RunCredential,
        resource: &ListResource,
        start: &ChangeToken,
        page_size: u32,
    ) -> Result<Page, FeedError>;

    /// The list's current change token, i.e. the position "now".
    async fn current_token(
        &self,
        credential: &RunCredential,
        resource: &ListResource,
    ) -> Result<ChangeToken, FeedError>;
}

#[derive(Debug, Deserialize)]
struct ChangesResponse {
    value: Vec<RawChange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawChange {
    #[serde(default)]
    item_id: Option<i64>,
    change_type: i64,
    change_token: RawToken,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    #[serde(rename = "StringValue")]
    string_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListTokenResponse {
    current_change_token: RawToken,
}

impl From<RawChange> for ChangeRecord {
    fn from(raw: RawChange) -> Self {
        match raw.item_id {
            Some(id) => ChangeRecord::new(
                EntityId::from(id),
                raw.change_token.string_value,
                ChangeKind::from_change_type(raw.change_type),
            ),
            // Not an item change; only its position matters.
            None => ChangeRecord::new(
                EntityId::new(""),
                raw.change_token.string_value,
                ChangeKind::Other,
            ),
        }
    }
}

/// REST implementation of [`ChangeFeed`].
#[derive(Debug, Clone)]
pub struct RestChangeFeed {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl RestChangeFeed {
    /// Create a client with the default timeout and retry policy.
    pub fn new() -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FeedError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            retry: RetryPolicy::default(),
        })
    }

    /// Use a preconfigured HTTP client.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn check_status(
        response: reqwest::Response,
        resource: &ListResource,
    ) -> Result<reqwest::Response, FeedError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::ResourceNotFound(resource.list_id.to_string()));
        }
        let message = response.text().await.unwrap_or_default();
        Err(FeedError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChangeFeed for RestChangeFeed {
    async fn fetch_page(
        &self,
        credential: &RunCredential,
        resource: &ListResource,
        start: &ChangeToken,
        page_size: u32,
    ) -> Result<Page, FeedError> {
        let query = ChangeQuery::items_since(start, page_size)?;
        let url = format!("{}/GetChanges", resource.list_endpoint());
        let body = serde_json::json!({ "query": query });

        let changes = self
            .retry
            .run("GetChanges", || async {
                let response = self
                    .http
                    .post(&url)
                    .header(reqwest::header::AUTHORIZATION, credential.bearer())
                    .header(reqwest::header::ACCEPT, ACCEPT_JSON)
                    .json(&body)
                    .send()
                    .await?;
                let response = Self::check_status(response, resource).await?;
                let parsed: ChangesResponse = response.json().await?;
                Ok::<_, FeedError>(parsed.value)
            })
            .await?;

        let records: Vec<ChangeRecord> = changes.into_iter().map(ChangeRecord::from).collect();
        tracing::debug!(
            "Fetched {} changes for list {} (page size {})",
            records.len(),
            resource.list_id,
            page_size
        );
        Ok(Page::new(records, query.fetch_limit()))
    }

    async fn current_token(
        &self,
        credential: &RunCredential,
        resource: &ListResource,
    ) -> Result<ChangeToken, FeedError> {
        let url = format!("{}?$select=CurrentChangeToken", resource.list_endpoint());

        let parsed: ListTokenResponse = self
            .retry
            .run("CurrentChangeToken", || async {
                let response = self
                    .http
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, credential.bearer())
                    .header(reqwest::header::ACCEPT, ACCEPT_JSON)
                    .send()
                    .await?;
                let response = Self::check_status(response, resource).await?;
                let parsed: ListTokenResponse = response.json().await?;
                Ok::<_, FeedError>(parsed)
            })
            .await?;

        Ok(ChangeToken::new(parsed.current_change_token.string_value))
    }
}
