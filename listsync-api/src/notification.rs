//! Webhook notification payloads.
//!
//! Upstream posts a batch `{"value": [...]}` to the webhook endpoint whenever a watched
//! list changes. A notification carries no change details, only which subscription and
//! list to reconcile.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single "something changed" ping for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Webhook subscription that fired
    pub subscription_id: Uuid,
    /// Opaque value supplied when the subscription was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_state: Option<String>,
    /// When the subscription expires unless renewed
    pub expiration_date_time: DateTime<Utc>,
    /// ID of the watched list
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Server-relative path of the site holding the list, e.g. `/sites/docs`
    pub site_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_id: Option<String>,
}

impl Notification {
    /// Parse the list ID out of `resource`.
    pub fn resource_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(self.resource.trim())
    }

    /// Absolute site URL on the given tenant host, e.g. `contoso.sharepoint.com`.
    pub fn site_absolute_url(&self, tenant_host: &str) -> String {
        absolute_site_url(tenant_host, &self.site_url)
    }

    /// Whether the subscription expires before `now + threshold`.
    pub fn expires_within(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.expiration_date_time < now + threshold
    }
}

/// Join a tenant host and a server-relative site path into an absolute site URL.
pub fn absolute_site_url(tenant_host: &str, site_path: &str) -> String {
    let host = tenant_host
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let path = site_path.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        format!("https://{host}{path}")
    } else {
        format!("https://{host}/{path}")
    }
}

/// The body posted to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationBatch {
    pub value: Vec<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PAYLOAD: &str = r#"{
        "value": [
            {
                "subscriptionId": "91779246-afe9-4525-b122-6c199ae89211",
                "clientState": "00000000-0000-0000-0000-000000000000",
                "expirationDateTime": "2024-04-05T09:27:00.0000000Z",
                "resource": "b9f6f714-9df8-470b-b22e-653855e1c181",
                "tenantId": "00000000-0000-0000-0000-000000000000",
                "siteUrl": "/sites/docs",
                "webId": "1b9ac7a6-0d21-4e66-a2e1-a1c5b4ed3a65"
            }
        ]
    }"#;

    fn sample() -> Notification {
        let batch: NotificationBatch = serde_json::from_str(PAYLOAD).unwrap();
        batch.value.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_webhook_payload() {
        let notification = sample();
        assert_eq!(
            notification.subscription_id,
            Uuid::parse_str("91779246-afe9-4525-b122-6c199ae89211").unwrap()
        );
        assert_eq!(notification.site_url, "/sites/docs");
        assert_eq!(
            notification.expiration_date_time,
            Utc.with_ymd_and_hms(2024, 4, 5, 9, 27, 0).unwrap()
        );
        assert_eq!(
            notification.resource_id().unwrap(),
            Uuid::parse_str("b9f6f714-9df8-470b-b22e-653855e1c181").unwrap()
        );
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let json = r#"{
            "subscriptionId": "91779246-afe9-4525-b122-6c199ae89211",
            "expirationDateTime": "2024-04-05T09:27:00Z",
            "resource": "b9f6f714-9df8-470b-b22e-653855e1c181",
            "siteUrl": "/sites/docs"
        }"#;
        let notification: Notification = serde_json::from_str(json).unwrap();
        assert!(notification.client_state.is_none());
        assert!(notification.tenant_id.is_none());
        assert!(notification.web_id.is_none());
    }

    #[test]
    fn test_invalid_resource_id() {
        let mut notification = sample();
        notification.resource = "not-a-guid".to_string();
        assert!(notification.resource_id().is_err());
    }

    #[test]
    fn test_site_absolute_url() {
        let notification = sample();
        assert_eq!(
            notification.site_absolute_url("contoso.sharepoint.com"),
            "https://contoso.sharepoint.com/sites/docs"
        );
        assert_eq!(
            notification.site_absolute_url("https://contoso.sharepoint.com/"),
            "https://contoso.sharepoint.com/sites/docs"
        );
    }

    #[test]
    fn test_absolute_site_url_normalizes_slashes() {
        assert_eq!(
            absolute_site_url("contoso.sharepoint.com", "sites/docs/"),
            "https://contoso.sharepoint.com/sites/docs"
        );
        assert_eq!(
            absolute_site_url("contoso.sharepoint.com", ""),
            "https://contoso.sharepoint.com"
        );
    }

    #[test]
    fn test_expires_within() {
        let mut notification = sample();
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();

        notification.expiration_date_time = now + Duration::days(4);
        assert!(notification.expires_within(now, Duration::days(5)));

        notification.expiration_date_time = now + Duration::days(10);
        assert!(!notification.expires_within(now, Duration::days(5)));
    }
}
