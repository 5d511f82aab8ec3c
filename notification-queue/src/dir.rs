//! Queue backend storing one file per message.
//!
//! Each queue is a directory under the root. Ready messages are `*.msg` files whose names
//! sort in enqueue order; claiming a message renames it to `*.inflight`, which is atomic
//! on a single filesystem, so two consumers can never claim the same message.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::backend::{QueueBackend, QueueMessage};
use crate::enqueuer::poison_queue_name;
use crate::error::{TransportError, TransportResult};

const READY_EXT: &str = "msg";
const IN_FLIGHT_EXT: &str = "inflight";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    body: String,
    dequeue_count: u32,
    enqueued_at: DateTime<Utc>,
}

/// Durable queue backend rooted at a directory.
#[derive(Debug)]
pub struct DirQueue {
    root: PathBuf,
    sequence: AtomicU64,
}

impl DirQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn queue_dir(&self, queue: &str) -> TransportResult<PathBuf> {
        let valid = !queue.is_empty()
            && queue
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TransportError::QueueNotFound(queue.to_string()));
        }
        Ok(self.root.join(queue))
    }

    async fn existing_queue_dir(&self, queue: &str) -> TransportResult<PathBuf> {
        let dir = self.queue_dir(queue)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(TransportError::QueueNotFound(queue.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransportError::QueueNotFound(queue.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Message IDs with the given extension, oldest first.
    async fn list(&self, dir: &Path, ext: &str) -> TransportResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Write `bytes` under a name `list` ignores, then rename it over `target`.
    async fn write_atomic(
        dir: &Path,
        id: &str,
        target: &Path,
        bytes: &[u8],
    ) -> TransportResult<()> {
        let tmp = dir.join(format!("{id}.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Move a claimed message whose envelope is unreadable to the poison queue.
    async fn poison_claimed(
        &self,
        queue: &str,
        claimed: &Path,
        bytes: &[u8],
    ) -> TransportResult<()> {
        let poison = poison_queue_name(queue);
        self.create_if_not_exists(&poison).await?;
        self.push(&poison, String::from_utf8_lossy(bytes).into_owned())
            .await?;
        match tokio::fs::remove_file(claimed).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn next_id(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{:020}-{:010}-{}", nanos, seq, Uuid::new_v4().simple())
    }
}

fn file_for(dir: &Path, id: &str, ext: &str) -> PathBuf {
    dir.join(format!("{id}.{ext}"))
}

fn not_in_flight(queue: &str, message: &QueueMessage) -> TransportError {
    TransportError::NotInFlight {
        queue: queue.to_string(),
        message_id: message.id.clone(),
    }
}

#[async_trait]
impl QueueBackend for DirQueue {
    async fn create_if_not_exists(&self, queue: &str) -> TransportResult<bool> {
        let dir = self.queue_dir(queue)?;
        if tokio::fs::metadata(&dir).await.is_ok() {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!("Created queue directory {}", dir.display());
        Ok(true)
    }

    async fn push(&self, queue: &str, body: String) -> TransportResult<()> {
        let dir = self.existing_queue_dir(queue).await?;
        let id = self.next_id();
        let envelope = Envelope {
            body,
            dequeue_count: 0,
            enqueued_at: Utc::now(),
        };

        let ready = file_for(&dir, &id, READY_EXT);
        Self::write_atomic(&dir, &id, &ready, &serde_json::to_vec(&envelope)?).await
    }

    async fn pop(&self, queue: &str) -> TransportResult<Option<QueueMessage>> {
        let dir = self.existing_queue_dir(queue).await?;

        for id in self.list(&dir, READY_EXT).await? {
            let ready = file_for(&dir, &id, READY_EXT);
            let claimed = file_for(&dir, &id, IN_FLIGHT_EXT);
            match tokio::fs::rename(&ready, &claimed).await {
                Ok(()) => {}
                // Another consumer won the race for this one.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            let bytes = tokio::fs::read(&claimed).await?;
            let mut envelope: Envelope = match serde_json::from_slice(&bytes) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(
                        "Moving unreadable message {} on queue {} to {}: {}",
                        id,
                        queue,
                        poison_queue_name(queue),
                        e
                    );
                    self.poison_claimed(queue, &claimed, &bytes).await?;
                    continue;
                }
            };
            envelope.dequeue_count = envelope.dequeue_count.saturating_add(1);
            Self::write_atomic(&dir, &id, &claimed, &serde_json::to_vec(&envelope)?).await?;

            return Ok(Some(QueueMessage {
                id,
                body: envelope.body,
                dequeue_count: envelope.dequeue_count,
            }));
        }

        Ok(None)
    }

    async fn complete(&self, queue: &str, message: &QueueMessage) -> TransportResult<()> {
        let dir = self.existing_queue_dir(queue).await?;
        match tokio::fs::remove_file(file_for(&dir, &message.id, IN_FLIGHT_EXT)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(not_in_flight(queue, message))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn abandon(&self, queue: &str, message: &QueueMessage) -> TransportResult<()> {
        let dir = self.existing_queue_dir(queue).await?;
        let claimed = file_for(&dir, &message.id, IN_FLIGHT_EXT);
        let ready = file_for(&dir, &message.id, READY_EXT);
        match tokio::fs::rename(&claimed, &ready).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(not_in_flight(queue, message))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn len(&self, queue: &str) -> TransportResult<usize> {
        let dir = self.existing_queue_dir(queue).await?;
        Ok(self.list(&dir, READY_EXT).await?.len())
    }

    async fn recover(&self, queue: &str) -> TransportResult<usize> {
        let dir = self.existing_queue_dir(queue).await?;
        let mut recovered = 0;
        for id in self.list(&dir, IN_FLIGHT_EXT).await? {
            let claimed = file_for(&dir, &id, IN_FLIGHT_EXT);
            match tokio::fs::rename(&claimed, file_for(&dir, &id, READY_EXT)).await {
                Ok(()) => recovered += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if recovered > 0 {
            tracing::warn!(
                "Recovered {} unfinished message(s) on queue {}",
                recovered,
                queue
            );
        }
        Ok(recovered)
    }
}
