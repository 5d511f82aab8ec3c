//! Per-subscription leases.
//!
//! Two notifications for the same subscription processed concurrently would pull the same
//! range and race on the cursor write. Holding the lease for the whole run serializes them;
//! runs for different subscriptions proceed in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct SubscriptionLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SubscriptionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lease on `subscription_id`.
    pub async fn acquire(&self, subscription_id: Uuid) -> SubscriptionLease {
        let lock = self
            .locks
            .entry(subscription_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let guard = lock.lock_owned().await;
        SubscriptionLease {
            subscription_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of subscriptions with a live lease entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of one run. Dropping it releases the lease.
#[derive(Debug)]
pub struct SubscriptionLease {
    subscription_id: Uuid,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SubscriptionLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map holds the mutex once nobody waits on it.
        self.locks
            .remove_if(&self.subscription_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
