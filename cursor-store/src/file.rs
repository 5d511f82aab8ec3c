//! Cursor store persisted as a single JSON document.
//!
//! Every write rewrites the whole document to a uniquely named sibling temp file and
//! renames it into place. A crash mid-write leaves the previous document intact.
//!
//! Load-modify-save cycles hold an exclusive lock on `<file>.lock`, so separate
//! processes sharing one document (a running `serve` and a `prime`) never drop each
//! other's records. Reads take no lock; the rename makes every document they see whole.

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{CursorRecord, CursorStore, StoreError, StoreResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    cursors: BTreeMap<Uuid, CursorRecord>,
}

impl Document {
    fn parse(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.is_empty() {
            return Ok(Document::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Exclusive OS lock on the sibling lock file, released on drop.
struct DocumentLock {
    file: File,
}

impl DocumentLock {
    /// Block until no other writer holds the lock.
    fn acquire(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path(path))?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn read_document(path: &Path) -> StoreResult<Document> {
    match std::fs::read(path) {
        Ok(bytes) => Document::parse(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
        Err(e) => Err(e.into()),
    }
}

fn write_document(path: &Path, document: &Document) -> StoreResult<()> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(&serde_json::to_vec_pretty(document)?)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Cursor store backed by a JSON file.
#[derive(Debug)]
pub struct JsonFileCursorStore {
    path: PathBuf,
    /// Keeps writers of this handle from queueing on the OS lock in blocking threads
    write_lock: Mutex<()>,
}

impl JsonFileCursorStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<Document> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Document::parse(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run one locked load-modify-save cycle. `change` reports whether it modified the
    /// document; unmodified documents are not rewritten.
    async fn modify<T, F>(&self, change: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Document) -> (T, bool) + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> StoreResult<T> {
            std::fs::create_dir_all(parent_dir(&path))?;
            let _lock = DocumentLock::acquire(&path)?;
            let mut document = read_document(&path)?;
            let (value, modified) = change(&mut document);
            if modified {
                write_document(&path, &document)?;
            }
            Ok(value)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("Cursor write task failed: {e}")))?
    }
}

#[async_trait]
impl CursorStore for JsonFileCursorStore {
    async fn get(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>> {
        let document = self.load().await?;
        Ok(document.cursors.get(&subscription_id).cloned())
    }

    async fn upsert(&self, record: CursorRecord) -> StoreResult<()> {
        tracing::debug!(
            "Persisting cursor for subscription {}: {}",
            record.subscription_id,
            record.last_change_token
        );
        self.modify(move |document| {
            document.cursors.insert(record.subscription_id, record);
            ((), true)
        })
        .await
    }

    async fn remove(&self, subscription_id: Uuid) -> StoreResult<Option<CursorRecord>> {
        self.modify(move |document| {
            let removed = document.cursors.remove(&subscription_id);
            let modified = removed.is_some();
            (removed, modified)
        })
        .await
    }
}
