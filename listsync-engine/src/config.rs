//! Configuration types for the reconciliation engine and its worker pool
//!
//! The engine constants (page size, bootstrap lookback, renewal threshold and extension)
//! default to the values upstream documents; they are fixed per deployment, not per run.

use chrono::{Duration, Months};
use listsync_api::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

use crate::error::{EngineError, Result};

/// Longest lifetime upstream accepts for a list webhook subscription, in months
pub const MAX_RENEWAL_EXTENSION_MONTHS: u32 = 6;

/// Configuration for the ReconciliationEngine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tenant host notifications are resolved against, e.g. `contoso.sharepoint.com`
    pub tenant_host: String,

    /// Webhook endpoint sent along with renewals
    pub webhook_endpoint: String,

    /// Changes requested per page
    /// Default: 1000, upstream maximum 2000
    pub page_size: u32,

    /// How far back a bootstrap token reaches when a subscription has no cursor
    /// Default: 5 minutes
    pub bootstrap_lookback: Duration,

    /// Renew when the subscription expires sooner than this
    /// Default: 5 days
    pub renewal_threshold: Duration,

    /// How far a renewal pushes the expiration out, in calendar months
    /// Default: 3
    pub renewal_extension_months: u32,

    /// Serialize concurrent runs for the same subscription
    /// Default: true
    pub serialize_subscriptions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tenant_host: String::new(),
            webhook_endpoint: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            bootstrap_lookback: Duration::minutes(5),
            renewal_threshold: Duration::days(5),
            renewal_extension_months: 3,
            serialize_subscriptions: true,
        }
    }
}

impl EngineConfig {
    /// Create a config for a tenant with default values
    pub fn new(tenant_host: impl Into<String>, webhook_endpoint: impl Into<String>) -> Self {
        Self {
            tenant_host: tenant_host.into(),
            webhook_endpoint: webhook_endpoint.into(),
            ..Default::default()
        }
    }

    /// Renewal extension as a calendar offset
    pub fn renewal_extension(&self) -> Months {
        Months::new(self.renewal_extension_months)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.tenant_host.trim().is_empty() {
            return Err(EngineError::Configuration(
                "Tenant host must not be empty".to_string(),
            ));
        }

        if self.webhook_endpoint.trim().is_empty() {
            return Err(EngineError::Configuration(
                "Webhook endpoint must not be empty".to_string(),
            ));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(EngineError::Configuration(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }

        if self.bootstrap_lookback < Duration::zero() {
            return Err(EngineError::Configuration(
                "Bootstrap lookback must not be negative".to_string(),
            ));
        }

        if self.renewal_extension_months == 0
            || self.renewal_extension_months > MAX_RENEWAL_EXTENSION_MONTHS
        {
            return Err(EngineError::Configuration(format!(
                "Renewal extension must be between 1 and {MAX_RENEWAL_EXTENSION_MONTHS} months, \
                 got {}",
                self.renewal_extension_months
            )));
        }

        // A month is at least 28 days.
        let shortest_extension = Duration::days(28 * i64::from(self.renewal_extension_months));
        if self.renewal_threshold <= Duration::zero()
            || self.renewal_threshold >= shortest_extension
        {
            return Err(EngineError::Configuration(
                "Renewal threshold must be positive and shorter than the renewal extension"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_bootstrap_lookback(mut self, lookback: Duration) -> Self {
        self.bootstrap_lookback = lookback;
        self
    }

    pub fn with_renewal(mut self, threshold: Duration, extension_months: u32) -> Self {
        self.renewal_threshold = threshold;
        self.renewal_extension_months = extension_months;
        self
    }

    pub fn with_subscription_serialization(mut self, enabled: bool) -> Self {
        self.serialize_subscriptions = enabled;
        self
    }
}

/// Configuration for the WorkerPool
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue the workers consume
    pub queue: String,

    /// Number of concurrent workers
    /// Default: 4
    pub workers: usize,

    /// Sleep between polls of an empty queue
    /// Default: 1 second
    pub poll_interval: std::time::Duration,

    /// How long shutdown waits for in-progress runs
    /// Default: 30 seconds
    pub shutdown_timeout: std::time::Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: notification_queue::QUEUE_NAME.to_string(),
            workers: 4,
            poll_interval: std::time::Duration::from_secs(1),
            shutdown_timeout: std::time::Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(EngineError::Configuration(
                "Queue name must not be empty".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(EngineError::Configuration(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(EngineError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new("contoso.sharepoint.com", "https://hooks.example.com/api/webhooks")
    }

    #[test]
    fn test_default_config() {
        let config = config();
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.bootstrap_lookback, Duration::minutes(5));
        assert_eq!(config.renewal_threshold, Duration::days(5));
        assert_eq!(config.renewal_extension(), Months::new(3));
        assert!(config.serialize_subscriptions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_err());
        assert!(config().with_page_size(0).validate().is_err());
        assert!(config().with_page_size(2001).validate().is_err());
        assert!(config().with_page_size(2000).validate().is_ok());
        assert!(config()
            .with_renewal(Duration::days(90), 3)
            .validate()
            .is_err());
        assert!(config().with_renewal(Duration::days(5), 0).validate().is_err());
        assert!(config().with_renewal(Duration::days(5), 6).validate().is_ok());
        assert!(config().with_renewal(Duration::days(5), 7).validate().is_err());
        assert!(config()
            .with_renewal(Duration::days(5), u32::MAX)
            .validate()
            .is_err());
        assert!(config()
            .with_bootstrap_lookback(Duration::minutes(-1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_worker_config() {
        let config = WorkerConfig::new();
        assert_eq!(config.queue, "sharepointlistwebhookevent");
        assert_eq!(config.workers, 4);
        assert!(config.validate().is_ok());

        assert!(WorkerConfig::new().with_workers(0).validate().is_err());
        assert!(WorkerConfig::new()
            .with_poll_interval(std::time::Duration::ZERO)
            .validate()
            .is_err());
        assert!(WorkerConfig::new().with_queue("").validate().is_err());
    }
}
