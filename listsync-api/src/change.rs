//! Change records, pages and the change query sent upstream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FeedError;
use crate::token::ChangeToken;

/// Upstream ceiling for the number of changes returned per request.
pub const MAX_PAGE_SIZE: u32 = 2000;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Identifier of a changed list item.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new entity ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the entity ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of change reported by the feed.
///
/// Only `Add` and `Update` are requested; the other variants exist because the
/// protocol can still report them and the token position must advance past them.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
    Other,
}

impl ChangeKind {
    /// Map the upstream numeric change type.
    pub fn from_change_type(change_type: i64) -> Self {
        match change_type {
            1 => ChangeKind::Add,
            2 => ChangeKind::Update,
            3 => ChangeKind::Delete,
            _ => ChangeKind::Other,
        }
    }

    /// Whether changes of this kind are handed to the change handler.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, ChangeKind::Add | ChangeKind::Update)
    }
}

/// A single change in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// The item that changed
    pub entity_id: EntityId,
    /// Position of this change in the feed
    pub change_token: ChangeToken,
    /// What happened to the item
    pub kind: ChangeKind,
}

impl ChangeRecord {
    /// Create a new change record.
    pub fn new(
        entity_id: impl Into<EntityId>,
        change_token: impl Into<ChangeToken>,
        kind: ChangeKind,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            change_token: change_token.into(),
            kind,
        }
    }
}

/// One page of changes plus the page size it was requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    changes: Vec<ChangeRecord>,
    requested: u32,
}

impl Page {
    /// Create a page from the changes returned for a request of `requested` records.
    pub fn new(changes: Vec<ChangeRecord>, requested: u32) -> Self {
        Self { changes, requested }
    }

    /// Changes in feed order.
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether the feed is exhausted after this page.
    ///
    /// Upstream signals more data only by filling the page completely.
    pub fn is_last(&self) -> bool {
        self.changes.len() < self.requested as usize
    }

    /// Token of the last change on the page.
    pub fn last_token(&self) -> Option<&ChangeToken> {
        self.changes.last().map(|c| &c.change_token)
    }
}

/// The watched list, addressed by its site URL and list ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListResource {
    /// Absolute URL of the site holding the list, without trailing slash
    pub site_url: String,
    /// List ID
    pub list_id: Uuid,
}

impl ListResource {
    /// Create a new list resource.
    pub fn new(site_url: impl Into<String>, list_id: Uuid) -> Self {
        let site_url = site_url.into().trim_end_matches('/').to_string();
        Self { site_url, list_id }
    }

    /// REST endpoint of the list.
    pub fn list_endpoint(&self) -> String {
        format!("{}/_api/web/lists(guid'{}')", self.site_url, self.list_id)
    }
}

/// Change query sent with every page request.
///
/// The query is fixed to item-level adds and updates so that deletions and
/// non-item changes are excluded upstream rather than filtered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeQuery {
    item: bool,
    add: bool,
    update: bool,
    delete_object: bool,
    system_update: bool,
    fetch_limit: u32,
    change_token_start: TokenValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct TokenValue {
    #[serde(rename = "StringValue")]
    string_value: String,
}

impl ChangeQuery {
    /// Build the item-level query starting at `start` with the given page size.
    pub fn items_since(start: &ChangeToken, page_size: u32) -> Result<Self, FeedError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(FeedError::InvalidRequest(format!(
                "page size {page_size} outside 1..={MAX_PAGE_SIZE}"
            )));
        }

        Ok(Self {
            item: true,
            add: true,
            update: true,
            delete_object: false,
            system_update: false,
            fetch_limit: page_size,
            change_token_start: TokenValue {
                string_value: start.as_str().to_string(),
            },
        })
    }

    pub fn fetch_limit(&self) -> u32 {
        self.fetch_limit
    }
}
