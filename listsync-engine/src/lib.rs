//! # listsync engine
//!
//! Turns "something changed on list X" pings into at-most-once-per-item handler calls and
//! a durable feed cursor.
//!
//! ## Overview
//!
//! A webhook notification carries no change details. For each notification the
//! [`ReconciliationEngine`] pulls the list's change feed from the subscription's stored
//! cursor, hands every changed item to a [`ChangeHandler`] once, persists the new cursor
//! and renews the subscription when it is close to expiring. The [`WorkerPool`] feeds the
//! engine from the notification queue.
//!
//! ## Guarantees
//!
//! - **Fail-closed pagination**: a feed error aborts the run without touching the cursor
//! - **Per-item isolation**: a failing handler call affects neither other items nor the cursor
//! - **One call per item per run**: repeated changes to an item collapse to a single call
//! - **Monotonic cursor**: the persisted token never moves backwards in feed order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use listsync_engine::{EngineConfig, ReconciliationEngine, WorkerConfig, WorkerPool};
//!
//! let engine = ReconciliationEngine::builder(EngineConfig::new(tenant, endpoint))
//!     .with_cursor_store(Arc::new(store))
//!     .with_change_feed(Arc::new(RestChangeFeed::new()?))
//!     .with_renewer(Arc::new(RestSubscriptionRenewer::new()))
//!     .with_credentials(Arc::new(credentials))
//!     .with_handler(Arc::new(MyHandler))
//!     .build()?;
//!
//! let pool = WorkerPool::start(Arc::new(engine), consumer, WorkerConfig::new()).await?;
//! // ...
//! pool.shutdown().await?;
//! ```

pub mod clock;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod handler;
pub mod locks;
pub mod summary;
pub mod worker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, WorkerConfig, MAX_RENEWAL_EXTENSION_MONTHS};
pub use engine::{EngineBuilder, ReconciliationEngine};
pub use error::{EngineError, Result};
pub use handler::{ChangeHandler, HandlerError, HandlerOutcome, LoggingHandler, ResourceContext};
pub use locks::{SubscriptionLease, SubscriptionLocks};
pub use summary::{RunOutcome, RunSummary};
pub use worker::WorkerPool;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ChangeHandler, EngineConfig, EngineError, HandlerError, HandlerOutcome,
        ReconciliationEngine, ResourceContext, Result, RunOutcome, RunSummary, WorkerConfig,
        WorkerPool,
    };
}
