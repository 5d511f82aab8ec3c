//! Typed API for list change feeds and webhook subscriptions
//!
//! This crate provides the wire-level building blocks the reconciliation engine drives:
//!
//! - [`Notification`]: the webhook payload delivered when a watched list changes
//! - [`ChangeToken`]: the opaque, ordered continuation cursor of a list's change feed
//! - [`ChangeFeed`]: paginated pulls of item-level changes starting from a token
//! - [`SubscriptionRenewer`]: extends a webhook subscription before it expires
//! - [`CredentialProvider`]: issues a single-use [`RunCredential`] per reconciliation run
//!
//! # Pulling one page of changes
//!
//! ```rust,ignore
//! use listsync_api::{ChangeFeed, ChangeToken, ListResource, RestChangeFeed};
//!
//! let feed = RestChangeFeed::new()?;
//! let resource = ListResource::new("https://contoso.sharepoint.com/sites/docs", list_id);
//! let page = feed.fetch_page(&credential, &resource, &token, 1000).await?;
//!
//! for change in page.changes() {
//!     println!("{} {:?} at {}", change.entity_id, change.kind, change.change_token);
//! }
//! ```
//!
//! Every network-facing trait takes the run's credential by reference. Nothing in this
//! crate caches an access token on a client instance, so one client can serve many
//! concurrent runs.

pub mod auth;
pub mod change;
pub mod error;
pub mod feed;
pub mod notification;
mod retry;
pub mod subscription;
pub mod token;

pub use auth::{
    ClientCredentialProvider, CredentialProvider, RunCredential, StaticCredentialProvider,
};
pub use change::{
    ChangeKind, ChangeQuery, ChangeRecord, EntityId, ListResource, Page, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use error::{AuthError, FeedError, RenewError};
pub use feed::{ChangeFeed, RestChangeFeed};
pub use notification::{absolute_site_url, Notification, NotificationBatch};
pub use retry::RetryPolicy;
pub use subscription::{RenewRequest, RestSubscriptionRenewer, SubscriptionRenewer};
pub use token::{ChangeToken, TokenPosition};
