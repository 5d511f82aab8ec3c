//! # notification-queue
//!
//! Durable hand-off of webhook notifications from the receiver to reconciliation workers.
//!
//! The producer side is the [`NotificationEnqueuer`]: it serializes a
//! [`Notification`](listsync_api::Notification) to JSON and appends it to a named queue,
//! creating the queue if it does not exist yet. The consumer side is the
//! [`NotificationConsumer`]: it claims one message at a time, decodes it, and moves
//! undecodable messages to a poison queue.
//!
//! Delivery is at-least-once. A claimed message that is never completed (for example
//! because the process died mid-run) is delivered again after
//! [`QueueBackend::recover`]; consumers must tolerate replays.

mod backend;
mod consumer;
mod dir;
mod enqueuer;
mod error;
mod memory;

pub use backend::{QueueBackend, QueueMessage};
pub use consumer::{Delivery, NotificationConsumer};
pub use dir::DirQueue;
pub use enqueuer::{poison_queue_name, NotificationEnqueuer, QUEUE_NAME};
pub use error::{TransportError, TransportResult};
pub use memory::MemoryQueue;
