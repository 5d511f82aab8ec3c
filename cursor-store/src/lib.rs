//! Durable change-token cursors
//!
//! One [`CursorRecord`] is kept per active webhook subscription. It records the last
//! change token whose changes have all been handed to the change handler, so the next
//! reconciliation run can resume from there.
//!
//! # Features
//!
//! - **Async trait**: [`CursorStore`] can be backed by anything from a map to a database
//! - **In-memory store**: [`MemoryCursorStore`] for tests and single-process setups
//! - **File store**: [`JsonFileCursorStore`] persists all cursors in one JSON document,
//!   replaced atomically on every write
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cursor_store::{CursorRecord, CursorStore, MemoryCursorStore};
//! use listsync_api::ChangeToken;
//!
//! let store = MemoryCursorStore::new();
//! store.upsert(CursorRecord::new(subscription_id, list_id, ChangeToken::new("1;3;..."))).await?;
//!
//! let cursor = store.get(subscription_id).await?;
//! ```
//!
//! Reads and writes within one run need no external coordination. Runs for the same
//! subscription may still race each other; serializing them is the caller's concern.

mod error;
mod file;
mod memory;
mod record;

pub use error::{StoreError, StoreResult};
pub use file::JsonFileCursorStore;
pub use memory::MemoryCursorStore;
pub use record::CursorRecord;

use async_trait::async_trait;
use uuid::Uuid;

/// Storage for per-subscription cursors.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Look up the cursor of a subscription.
    async fn get(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>>;

    /// Create or replace the cursor of `record.subscription_id`.
    async fn upsert(&self, record: CursorRecord) -> StoreResult<()>;

    /// Delete the cursor of a subscription, returning it if it existed.
    async fn remove(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>>;
}
