//! In-process queue backend.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::{QueueBackend, QueueMessage};
use crate::error::{TransportError, TransportResult};

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    in_flight: HashMap<String, QueueMessage>,
}

/// Queue backend held entirely in memory.
///
/// Clones share the same queues. Messages do not survive the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    queues: Arc<DashMap<String, Arc<Mutex<QueueState>>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, queue: &str) -> TransportResult<Arc<Mutex<QueueState>>> {
        self.queues
            .get(queue)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))
    }

    /// Number of claimed, uncompleted messages.
    pub fn in_flight(&self, queue: &str) -> usize {
        self.queues
            .get(queue)
            .map(|entry| entry.value().lock().in_flight.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn create_if_not_exists(&self, queue: &str) -> TransportResult<bool> {
        if self.queues.contains_key(queue) {
            return Ok(false);
        }
        let created = match self.queues.entry(queue.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(QueueState::default())));
                true
            }
        };
        Ok(created)
    }

    async fn push(&self, queue: &str, body: String) -> TransportResult<()> {
        let state = self.state(queue)?;
        state.lock().ready.push_back(QueueMessage {
            id: Uuid::new_v4().to_string(),
            body,
            dequeue_count: 0,
        });
        Ok(())
    }

    async fn pop(&self, queue: &str) -> TransportResult<Option<QueueMessage>> {
        let state = self.state(queue)?;
        let mut state = state.lock();
        let Some(mut message) = state.ready.pop_front() else {
            return Ok(None);
        };
        message.dequeue_count += 1;
        state.in_flight.insert(message.id.clone(), message.clone());
        Ok(Some(message))
    }

    async fn complete(&self, queue: &str, message: &QueueMessage) -> TransportResult<()> {
        let state = self.state(queue)?;
        let removed = state.lock().in_flight.remove(&message.id);
        match removed {
            Some(_) => Ok(()),
            None => Err(TransportError::NotInFlight {
                queue: queue.to_string(),
                message_id: message.id.clone(),
            }),
        }
    }

    async fn abandon(&self, queue: &str, message: &QueueMessage) -> TransportResult<()> {
        let state = self.state(queue)?;
        let mut state = state.lock();
        match state.in_flight.remove(&message.id) {
            Some(claimed) => {
                state.ready.push_back(claimed);
                Ok(())
            }
            None => Err(TransportError::NotInFlight {
                queue: queue.to_string(),
                message_id: message.id.clone(),
            }),
        }
    }

    async fn len(&self, queue: &str) -> TransportResult<usize> {
        let state = self.state(queue)?;
        let len = state.lock().ready.len();
        Ok(len)
    }
}
