//! Command line and environment settings

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use clap::{Args, Parser, Subcommand};
use listsync_api::{
    ClientCredentialProvider, CredentialProvider, StaticCredentialProvider, DEFAULT_PAGE_SIZE,
};
use listsync_engine::{EngineConfig, WorkerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::logging::LoggingMode;

/// Principal ID of the list service, combined with the site host and realm.
const LIST_SERVICE_PRINCIPAL: &str = "00000003-0000-0ff1-ce00-000000000000";

/// File under the data directory holding all cursors
pub const CURSOR_FILE: &str = "cursors.json";

/// Directory under the data directory holding the notification queues
pub const QUEUE_DIR: &str = "queue";

/// listsync
///
/// Receives list webhook notifications and reconciles each one against the list's
/// change feed.
#[derive(Parser, Debug)]
#[command(name = "listsync")]
#[command(about = "Reconcile list webhook notifications against the list change feed")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Logging mode (silent, development, debug, json)
    #[arg(long, env = "LISTSYNC_LOG_MODE", default_value = "development")]
    pub log_mode: LoggingMode,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the webhook receiver and reconciliation workers until Ctrl-C
    Serve(ServeArgs),

    /// Record the current change token for a new subscription
    Prime(PrimeArgs),

    /// Remove the cursor of a deleted subscription
    Forget(ForgetArgs),
}

/// Settings shared by every command
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Tenant host, e.g. contoso.sharepoint.com
    #[arg(long, env = "LISTSYNC_TENANT")]
    pub tenant: String,

    /// Public URL notifications are delivered to, registered on renewal
    #[arg(long, env = "LISTSYNC_WEBHOOK_ENDPOINT")]
    pub webhook_endpoint: String,

    /// App principal client ID
    #[arg(long, env = "LISTSYNC_CLIENT_ID")]
    pub client_id: Option<String>,

    /// App principal client secret
    #[arg(long, env = "LISTSYNC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Tenant realm (directory ID)
    #[arg(long, env = "LISTSYNC_REALM")]
    pub realm: Option<String>,

    /// Token endpoint, defaults to the access control endpoint of the realm
    #[arg(long, env = "LISTSYNC_TOKEN_ENDPOINT")]
    pub token_endpoint: Option<String>,

    /// Pre-issued access token, used instead of client credentials
    #[arg(long, env = "LISTSYNC_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Directory for cursors and queued notifications
    #[arg(long, env = "LISTSYNC_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Change records requested per feed page
    #[arg(long, env = "LISTSYNC_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Renew subscriptions expiring within this many days
    #[arg(long, env = "LISTSYNC_RENEWAL_THRESHOLD_DAYS", default_value_t = 5)]
    pub renewal_threshold_days: i64,

    /// Months a renewal extends a subscription by, at most 6
    #[arg(long, env = "LISTSYNC_RENEWAL_MONTHS", default_value_t = 3)]
    pub renewal_months: u32,
}

impl Settings {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let threshold = Duration::try_days(self.renewal_threshold_days).ok_or_else(|| {
            anyhow!(
                "Renewal threshold of {} days is out of range",
                self.renewal_threshold_days
            )
        })?;

        Ok(EngineConfig::new(&self.tenant, &self.webhook_endpoint)
            .with_page_size(self.page_size)
            .with_renewal(threshold, self.renewal_months))
    }

    /// The configured data directory, or `listsync` under the platform data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join("listsync"))
                .ok_or_else(|| anyhow!("No platform data directory, pass --data-dir")),
        }
    }

    pub fn cursor_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(CURSOR_FILE))
    }

    pub fn queue_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(QUEUE_DIR))
    }

    /// Credential provider for the configured authentication method.
    ///
    /// A pre-issued access token wins over client credentials.
    pub fn credentials(&self) -> Result<Arc<dyn CredentialProvider>> {
        if let Some(token) = &self.access_token {
            return Ok(Arc::new(StaticCredentialProvider::new(token.clone())));
        }

        let (Some(client_id), Some(client_secret), Some(realm)) =
            (&self.client_id, &self.client_secret, &self.realm)
        else {
            return Err(anyhow!(
                "Either --access-token or all of --client-id, --client-secret and --realm \
                 are required"
            ));
        };

        let token_endpoint = self.token_endpoint.clone().unwrap_or_else(|| {
            format!("https://accounts.accesscontrol.windows.net/{realm}/tokens/OAuth/2")
        });

        Ok(Arc::new(ClientCredentialProvider::new(
            token_endpoint,
            format!("{client_id}@{realm}"),
            client_secret.clone(),
            format!("{LIST_SERVICE_PRINCIPAL}/{{host}}@{realm}"),
        )))
    }

    /// Validate the settings and return any issues
    pub fn validate(&self) -> Result<()> {
        self.engine_config()?
            .validate()
            .context("Invalid engine settings")?;
        self.credentials().map(|_| ())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Webhook receiver port range start
    #[arg(long, env = "LISTSYNC_PORT_START", default_value_t = 8080)]
    pub port_start: u16,

    /// Webhook receiver port range end
    #[arg(long, env = "LISTSYNC_PORT_END", default_value_t = 8090)]
    pub port_end: u16,

    /// Number of reconciliation workers
    #[arg(long, env = "LISTSYNC_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Queue poll interval in milliseconds
    #[arg(long, env = "LISTSYNC_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Seconds to wait for in-progress runs on shutdown
    #[arg(long, env = "LISTSYNC_SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,
}

impl ServeArgs {
    pub fn port_range(&self) -> (u16, u16) {
        (self.port_start, self.port_end)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::new()
            .with_workers(self.workers)
            .with_poll_interval(std::time::Duration::from_millis(self.poll_interval_ms))
            .with_shutdown_timeout(std::time::Duration::from_secs(self.shutdown_timeout_secs))
    }

    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.port_start == 0 || self.port_end == 0 {
            return Err(anyhow!("Port range must not include port 0"));
        }

        if self.port_start > self.port_end {
            return Err(anyhow!(
                "Invalid port range: start ({}) > end ({})",
                self.port_start,
                self.port_end
            ));
        }

        self.worker_config()
            .validate()
            .context("Invalid worker settings")
    }
}

#[derive(Args, Debug, Clone)]
pub struct PrimeArgs {
    /// Subscription ID returned when the webhook was created
    #[arg(long)]
    pub subscription: Uuid,

    /// ID of the watched list
    #[arg(long)]
    pub resource: Uuid,

    /// Server-relative site path, e.g. /sites/docs
    #[arg(long)]
    pub site: String,
}

#[derive(Args, Debug, Clone)]
pub struct ForgetArgs {
    /// Subscription ID of the deleted webhook
    #[arg(long)]
    pub subscription: Uuid,
}
