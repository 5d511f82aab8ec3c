//! # listsync
//!
//! Receives list webhook notifications and reconciles each one against the list's change
//! feed, handing every changed item to a change handler.
//!
//! The `listsync` binary wires the workspace crates together:
//!
//! - `callback-server` accepts notifications and enqueues them
//! - `notification-queue` holds them in a directory-backed queue under the data directory
//! - `listsync-engine` workers drain the queue, pull the change feed and renew subscriptions
//! - `cursor-store` keeps one change token per subscription in `cursors.json`
//!
//! ```text
//! listsync --tenant contoso.sharepoint.com \
//!          --webhook-endpoint https://hooks.example.com/api/webhooks \
//!          --client-id $ID --client-secret $SECRET --realm $REALM \
//!          serve --port-start 8080 --port-end 8090
//! ```
//!
//! Every flag can also be set through a `LISTSYNC_*` environment variable.

pub mod commands;
pub mod logging;
pub mod settings;

pub use logging::{init_logging, LoggingError, LoggingMode};
pub use settings::{Cli, Command, Settings};
