//! Webhook subscription renewal.
//!
//! Subscriptions expire upstream unless their expiration date is pushed out. A silently
//! expired subscription stops notifications altogether, so callers must treat both an
//! error and a `false` result as a failure.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::RunCredential;
use crate::error::RenewError;

/// Parameters for extending a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewRequest {
    /// Absolute URL of the site holding the list
    pub resource_url: String,
    /// List the subscription watches
    pub resource_id: Uuid,
    pub subscription_id: Uuid,
    /// Webhook endpoint notifications are delivered to
    pub callback_endpoint: String,
    /// New expiration date
    pub new_expiry: DateTime<Utc>,
}

/// Extends webhook subscriptions.
#[async_trait]
pub trait SubscriptionRenewer: Send + Sync {
    /// Push the subscription's expiration out to `request.new_expiry`.
    ///
    /// Returns `Ok(false)` if upstream refused the renewal.
    async fn renew(
        &self,
        request: &RenewRequest,
        credential: &RunCredential,
    ) -> Result<bool, RenewError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewBody<'a> {
    notification_url: &'a str,
    expiration_date_time: String,
    resource: String,
}

/// REST implementation of [`SubscriptionRenewer`].
#[derive(Debug, Clone, Default)]
pub struct RestSubscriptionRenewer {
    http: reqwest::Client,
}

impl RestSubscriptionRenewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured HTTP client.
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn endpoint(request: &RenewRequest) -> String {
        format!(
            "{}/_api/web/lists('{}')/subscriptions('{}')",
            request.resource_url.trim_end_matches('/'),
            request.resource_id,
            request.subscription_id
        )
    }
}

#[async_trait]
impl SubscriptionRenewer for RestSubscriptionRenewer {
    async fn renew(
        &self,
        request: &RenewRequest,
        credential: &RunCredential,
    ) -> Result<bool, RenewError> {
        let body = RenewBody {
            notification_url: &request.callback_endpoint,
            expiration_date_time: request.new_expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
            resource: request.resource_id.to_string(),
        };

        let response = self
            .http
            .patch(Self::endpoint(request))
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(
                "Renewed subscription {} until {}",
                request.subscription_id,
                request.new_expiry
            );
            return Ok(true);
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            tracing::warn!(
                "Renewal of subscription {} refused ({}): {}",
                request.subscription_id,
                status,
                message
            );
            return Ok(false);
        }

        Err(RenewError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}
