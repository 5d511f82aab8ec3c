//! App-only credentials scoped to a single reconciliation run.
//!
//! A [`CredentialProvider`] is asked for a fresh [`RunCredential`] at the start of every
//! run. The credential is then passed by reference to every collaborator that talks to
//! upstream, so the access token lives in the run's scope and never on a shared client.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::AuthError;

/// Bearer credential valid for the duration of one run.
#[derive(Clone, PartialEq, Eq)]
pub struct RunCredential {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl RunCredential {
    /// Create a credential from an already issued access token.
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// The raw access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for RunCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCredential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues run credentials for a site.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Acquire a credential valid for requests against `site_url`.
    async fn acquire(&self, site_url: &str) -> Result<RunCredential, AuthError>;
}

/// Hands out the same pre-issued token for every run.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: RunCredential,
}

impl StaticCredentialProvider {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            credential: RunCredential::new(access_token, None),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn acquire(&self, _site_url: &str) -> Result<RunCredential, AuthError> {
        Ok(self.credential.clone())
    }
}

/// OAuth2 client-credentials flow against a token endpoint.
///
/// The `resource` template may contain `{host}`, which is replaced with the host of the
/// site being accessed.
#[derive(Debug, Clone)]
pub struct ClientCredentialProvider {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    resource: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl ClientCredentialProvider {
    pub fn new(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            resource: resource.into(),
        }
    }

    /// Use a preconfigured HTTP client, e.g. one with custom timeouts.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn resource_for(&self, site_url: &str) -> String {
        let host = url::Url::parse(site_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        self.resource.replace("{host}", &host)
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialProvider {
    async fn acquire(&self, site_url: &str) -> Result<RunCredential, AuthError> {
        let resource = self.resource_for(site_url);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", resource.as_str()),
        ];

        let response = self.http.post(&self.token_endpoint).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("missing access_token".to_string()))?;

        // Token endpoints disagree on whether expires_in is a number or a string.
        let expires_in = body.expires_in.and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        });
        let expires_at = expires_in.map(|secs| Utc::now() + Duration::seconds(secs));

        tracing::debug!("Acquired run credential for {}", site_url);
        Ok(RunCredential::new(access_token, expires_at))
    }
}
