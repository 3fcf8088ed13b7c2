//! Safe storage facade.
//!
//! Read/write/delete primitives that run every store call through the retry
//! executor and, when a write or delete exhausts its retries, capture the
//! operation in the durable pending queue before re-raising.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{PendingOperation, QueuedOperation};

use super::error::StorageError;
use super::queue::PendingQueue;
use super::retry::{execute_with_retry, RetryPolicy};
use super::{DocumentStore, WriteBatch};

/// Outcome of one replay pass over the pending queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    pub requeued: usize,
    pub dropped: usize,
}

/// Facade over a [`DocumentStore`] that makes single-document writes safe to
/// issue under intermittent connectivity.
///
/// Multi-document batches go through the retry executor but are never
/// queued: a transition plan is built against state read beforehand and must
/// not replay against state that has moved on.
#[derive(Clone)]
pub struct SafeStorage {
    store: Arc<dyn DocumentStore>,
    queue: Arc<PendingQueue>,
    policy: RetryPolicy,
}

impl SafeStorage {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queue: Arc<PendingQueue>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            queue,
            policy,
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Reads and deserializes one document. Read failures are never queued.
    pub async fn read<T: DeserializeOwned>(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<T>, StorageError> {
        let found = execute_with_retry(&self.policy, "get", || {
            self.store.get(collection, document_id)
        })
        .await?;
        match found {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Creates a document. On retry exhaustion the write is queued for
    /// replay and the error re-raised with `queued` set.
    pub async fn create<T: Serialize>(
        &self,
        collection: &str,
        document_id: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        self.write_queued(QueuedOperation::Create, collection, document_id, value)
            .await
    }

    /// Updates a document; same queueing behavior as [`SafeStorage::create`].
    pub async fn write<T: Serialize>(
        &self,
        collection: &str,
        document_id: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        self.write_queued(QueuedOperation::Update, collection, document_id, value)
            .await
    }

    /// Deletes a document; on retry exhaustion the delete is queued for
    /// replay and the error re-raised.
    pub async fn delete(&self, collection: &str, document_id: &str) -> Result<(), StorageError> {
        let result = execute_with_retry(&self.policy, "delete", || {
            self.store.delete(collection, document_id)
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(StorageError::RetriesExhausted {
                attempts, source, ..
            }) => {
                let pending = PendingOperation::new(
                    QueuedOperation::Delete,
                    collection.to_string(),
                    document_id.to_string(),
                    None,
                );
                let queued = self.enqueue(pending).await;
                Err(StorageError::RetriesExhausted {
                    attempts,
                    queued,
                    source,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Runs a transition batch through the retry executor. Conflicts and
    /// permission failures propagate on the first attempt; exhaustion is
    /// reported but never queued.
    pub async fn apply_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        execute_with_retry(&self.policy, "apply_batch", || {
            let batch = batch.clone();
            async move { self.store.apply_batch(batch).await }
        })
        .await
    }

    pub async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        execute_with_retry(&self.policy, "list_ids", || self.store.list_ids(collection)).await
    }

    /// Replays queued operations in insertion order. Successful entries are
    /// removed; failing entries stay for the next pass until the replay
    /// ceiling, where they are dropped and logged. A dropped write is
    /// permanently lost from the client's perspective.
    pub async fn process_pending(&self) -> Result<ReplayReport, StorageError> {
        let operations = self.queue.list().await;
        if operations.is_empty() {
            return Ok(ReplayReport::default());
        }

        tracing::info!(pending = operations.len(), "Replaying pending operations");
        let mut report = ReplayReport::default();

        for operation in operations {
            match self.replay(&operation).await {
                Ok(()) => {
                    self.queue.remove(&operation.id).await?;
                    report.replayed += 1;
                    tracing::info!(
                        id = %operation.id,
                        operation = %operation.operation,
                        collection = %operation.collection,
                        document_id = %operation.document_id,
                        "Replayed pending operation"
                    );
                }
                Err(err) => {
                    let retry_count = self.queue.increment_retry(&operation.id).await?;
                    if self.queue.has_reached_max(&operation.id).await {
                        self.queue.remove(&operation.id).await?;
                        report.dropped += 1;
                        metrics::counter!("pending_operations_dropped_total").increment(1);
                        tracing::error!(
                            id = %operation.id,
                            operation = %operation.operation,
                            collection = %operation.collection,
                            document_id = %operation.document_id,
                            retry_count,
                            error = %err,
                            "Dropping pending operation after repeated replay failures"
                        );
                    } else {
                        report.requeued += 1;
                        tracing::warn!(
                            id = %operation.id,
                            retry_count,
                            error = %err,
                            "Pending operation failed, kept for next replay pass"
                        );
                    }
                }
            }
        }

        tracing::info!(
            replayed = report.replayed,
            requeued = report.requeued,
            dropped = report.dropped,
            "Replay pass complete"
        );
        Ok(report)
    }

    async fn write_queued<T: Serialize>(
        &self,
        operation: QueuedOperation,
        collection: &str,
        document_id: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let operation_name = match operation {
            QueuedOperation::Create => "create",
            QueuedOperation::Update => "update",
            QueuedOperation::Delete => "delete",
        };
        let document = bson::to_document(value)?;

        let result = execute_with_retry(&self.policy, operation_name, || {
            let document = document.clone();
            async move { self.store.put(collection, document_id, document).await }
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(StorageError::RetriesExhausted {
                attempts, source, ..
            }) => {
                let payload = serde_json::to_value(value)?;
                let pending = PendingOperation::new(
                    operation,
                    collection.to_string(),
                    document_id.to_string(),
                    Some(payload),
                );
                let queued = self.enqueue(pending).await;
                Err(StorageError::RetriesExhausted {
                    attempts,
                    queued,
                    source,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn enqueue(&self, operation: PendingOperation) -> bool {
        let collection = operation.collection.clone();
        match self.queue.add(operation).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    collection = %collection,
                    error = %err,
                    "Failed to queue operation after retry exhaustion"
                );
                false
            }
        }
    }

    async fn replay(&self, operation: &PendingOperation) -> Result<(), StorageError> {
        match operation.operation {
            QueuedOperation::Create | QueuedOperation::Update => {
                let payload = operation.payload.as_ref().ok_or_else(|| {
                    StorageError::Serialization(format!(
                        "pending operation {} has no payload",
                        operation.id
                    ))
                })?;
                let document = bson::to_document(payload)?;
                execute_with_retry(&self.policy, "replay_put", || {
                    let document = document.clone();
                    async move {
                        self.store
                            .put(&operation.collection, &operation.document_id, document)
                            .await
                    }
                })
                .await
            }
            QueuedOperation::Delete => {
                execute_with_retry(&self.policy, "replay_delete", || {
                    self.store
                        .delete(&operation.collection, &operation.document_id)
                })
                .await
            }
        }
    }
}
