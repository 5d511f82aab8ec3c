//! In-memory cursor store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{CursorRecord, CursorStore, StoreResult};

/// Cursor store backed by a shared map.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursorStore {
    records: Arc<RwLock<HashMap<Uuid, CursorRecord>>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records.
    pub fn with_records(records: impl IntoIterator<Item = CursorRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.subscription_id, r))
            .collect::<HashMap<_, _>>();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>> {
        Ok(self.records.read().get(&subscription_id).cloned())
    }

    async fn upsert(&self, record: CursorRecord) -> StoreResult<()> {
        self.records.write().insert(record.subscription_id, record);
        Ok(())
    }

    async fn remove(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>> {
        Ok(self.records.write().remove(&subscription_id))
    }
}
