use listsync_api::ChangeToken;
use uuid::Uuid;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The feed was read to its end
    Completed,
    /// The list was deleted before the run got to it
    ResourceGone,
}

/// What one reconciliation run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub subscription_id: Uuid,
    /// Pages pulled from the feed
    pub pages: usize,
    /// Change records returned across all pages
    pub changes_seen: usize,
    /// Handler invocations that returned Pass
    pub dispatched: usize,
    /// Handler invocations that returned Fail or an error
    pub handler_failures: usize,
    /// Records not handed to the handler (duplicates, deletes, other kinds)
    pub skipped: usize,
    pub start_token: ChangeToken,
    pub end_token: ChangeToken,
    /// Whether the cursor store was written
    pub cursor_written: bool,
    /// Whether the subscription was renewed
    pub renewed: bool,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub(crate) fn new(subscription_id: Uuid, start_token: ChangeToken) -> Self {
        Self {
            subscription_id,
            pages: 0,
            changes_seen: 0,
            dispatched: 0,
            handler_failures: 0,
            skipped: 0,
            end_token: start_token.clone(),
            start_token,
            cursor_written: false,
            renewed: false,
            outcome: RunOutcome::Completed,
        }
    }

    /// Total handler invocations.
    pub fn handled(&self) -> usize {
        self.dispatched + self.handler_failures
    }
}
