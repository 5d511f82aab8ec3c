//! Collapsing repeated changes to the same item.
//!
//! A busy item can appear many times in one page. The handler only needs to see it once
//! to reprocess its current state, so each page is collapsed to the last occurrence of
//! every item, kept in the order of those last occurrences.

use listsync_api::{ChangeRecord, EntityId};
use std::collections::{HashMap, HashSet};

/// Last Add/Update occurrence of every entity in `changes`, in feed order.
///
/// Delete and other kinds are dropped; they only move the cursor.
pub fn collapse_page(changes: &[ChangeRecord]) -> Vec<&ChangeRecord> {
    let mut last_index: HashMap<&EntityId, usize> = HashMap::new();
    for (index, change) in changes.iter().enumerate() {
        if change.kind.is_dispatchable() {
            last_index.insert(&change.entity_id, index);
        }
    }

    let mut indices: Vec<usize> = last_index.into_values().collect();
    indices.sort_unstable();
    indices.into_iter().map(|i| &changes[i]).collect()
}

/// Tracks which entities a run has already handed to the handler.
#[derive(Debug, Default)]
pub struct RunDeduplicator {
    dispatched: HashSet<EntityId>,
}

impl RunDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes from `page` that should be dispatched, marking them as dispatched.
    ///
    /// An entity already dispatched earlier in the run is skipped even if it changed
    /// again on a later page.
    pub fn admit<'a>(&mut self, page: &'a [ChangeRecord]) -> Vec<&'a ChangeRecord> {
        collapse_page(page)
            .into_iter()
            .filter(|change| self.dispatched.insert(change.entity_id.clone()))
            .collect()
    }

    /// Number of distinct entities dispatched so far.
    pub fn len(&self) -> usize {
        self.dispatched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty()
    }
}
