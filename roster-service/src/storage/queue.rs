//! Durable pending-operation queue.
//!
//! A local FIFO log of writes that exhausted their retries. Entries replay in
//! insertion order; duplicates targeting the same document can coexist and
//! are never merged or compacted.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use crate::models::PendingOperation;

use super::error::StorageError;

/// Persistence backend for the queue. The whole list is rewritten after
/// every mutation so a crash never loses an accepted entry.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> Result<Vec<PendingOperation>, StorageError>;
    async fn persist(&self, operations: &[PendingOperation]) -> Result<(), StorageError>;
}

/// Keeps the queue in process memory only; used by tests.
#[derive(Default)]
pub struct MemoryQueueStore {
    operations: Mutex<Vec<PendingOperation>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<PendingOperation>, StorageError> {
        Ok(self.operations.lock().await.clone())
    }

    async fn persist(&self, operations: &[PendingOperation]) -> Result<(), StorageError> {
        *self.operations.lock().await = operations.to_vec();
        Ok(())
    }
}

/// Stores the queue as a single JSON file, rewritten through a temp file and
/// rename so a crash mid-write leaves the previous log intact.
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load(&self) -> Result<Vec<PendingOperation>, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Backend(err.to_string())),
        };
        match serde_json::from_slice(&bytes) {
            Ok(operations) => Ok(operations),
            Err(err) => {
                // Corrupt log: start empty; the next persist overwrites it.
                tracing::error!(
                    path = %self.path.display(),
                    error = %err,
                    "Pending queue file is corrupt, starting with an empty queue"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn persist(&self, operations: &[PendingOperation]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|err| StorageError::Backend(err.to_string()))?;
            }
        }

        let json = serde_json::to_vec_pretty(operations)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        Ok(())
    }
}

/// FIFO queue of pending operations, persisted through a [`QueueStore`]
/// after every mutation. Single active client session; no concurrent-writer
/// protection on the backing file.
pub struct PendingQueue {
    store: Arc<dyn QueueStore>,
    operations: Mutex<Vec<PendingOperation>>,
    max_replay_attempts: u32,
}

impl PendingQueue {
    pub async fn load(
        store: Arc<dyn QueueStore>,
        max_replay_attempts: u32,
    ) -> Result<Self, StorageError> {
        let operations = store.load().await?;
        if !operations.is_empty() {
            tracing::info!(
                pending = operations.len(),
                "Loaded pending operations from queue store"
            );
        }
        Ok(Self {
            store,
            operations: Mutex::new(operations),
            max_replay_attempts,
        })
    }

    pub fn max_replay_attempts(&self) -> u32 {
        self.max_replay_attempts
    }

    /// Appends an entry. Duplicates for the same document are kept and
    /// replay independently.
    pub async fn add(&self, operation: PendingOperation) -> Result<(), StorageError> {
        let mut operations = self.operations.lock().await;
        tracing::info!(
            id = %operation.id,
            operation = %operation.operation,
            collection = %operation.collection,
            document_id = %operation.document_id,
            "Queued pending operation"
        );
        operations.push(operation);
        metrics::gauge!("pending_operations").set(operations.len() as f64);
        self.store.persist(&operations).await
    }

    /// Removes an entry by id; unknown ids are a no-op.
    pub async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let mut operations = self.operations.lock().await;
        let before = operations.len();
        operations.retain(|op| op.id != id);
        if operations.len() == before {
            return Ok(());
        }
        metrics::gauge!("pending_operations").set(operations.len() as f64);
        self.store.persist(&operations).await
    }

    /// Bumps an entry's retry count and returns the new value; unknown ids
    /// return 0.
    pub async fn increment_retry(&self, id: &str) -> Result<u32, StorageError> {
        let mut operations = self.operations.lock().await;
        let count = match operations.iter_mut().find(|op| op.id == id) {
            Some(entry) => {
                entry.retry_count += 1;
                entry.retry_count
            }
            None => return Ok(0),
        };
        self.store.persist(&operations).await?;
        Ok(count)
    }

    pub async fn has_reached_max(&self, id: &str) -> bool {
        let operations = self.operations.lock().await;
        operations
            .iter()
            .find(|op| op.id == id)
            .map(|op| op.retry_count >= self.max_replay_attempts)
            .unwrap_or(false)
    }

    /// Entries in insertion order.
    pub async fn list(&self) -> Vec<PendingOperation> {
        self.operations.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.operations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.operations.lock().await.is_empty()
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut operations = self.operations.lock().await;
        operations.clear();
        metrics::gauge!("pending_operations").set(0.0);
        self.store.persist(&operations).await
    }
}
