//! Storage layer: the document-store seam, retry executor, pending-operation
//! queue, and the safe facade that ties them together.

pub mod error;
pub mod memory;
pub mod mongo;
pub mod queue;
pub mod retry;
pub mod safe;

use async_trait::async_trait;
use bson::Document;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use queue::{FileQueueStore, MemoryQueueStore, PendingQueue, QueueStore};
pub use retry::{execute_with_retry, RetryPolicy};
pub use safe::{ReplayReport, SafeStorage};

/// One write inside an atomic batch.
///
/// A `Put` with `expected_revision` set only applies if the stored document
/// still carries that revision; a mismatch fails the whole batch with
/// [`StorageError::Conflict`]. A `Put` without an expected revision is an
/// unconditional upsert.
#[derive(Debug, Clone)]
pub enum PlannedWrite {
    Put {
        collection: String,
        document_id: String,
        document: Document,
        expected_revision: Option<i64>,
    },
    Delete {
        collection: String,
        document_id: String,
    },
}

impl PlannedWrite {
    pub fn collection(&self) -> &str {
        match self {
            PlannedWrite::Put { collection, .. } => collection,
            PlannedWrite::Delete { collection, .. } => collection,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            PlannedWrite::Put { document_id, .. } => document_id,
            PlannedWrite::Delete { document_id, .. } => document_id,
        }
    }
}

/// An ordered multi-document write plan. Either every write applies or none
/// does; the store provides that guarantee, not the caller.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<PlannedWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self { writes: Vec::new() }
    }

    pub fn put(
        &mut self,
        collection: impl Into<String>,
        document_id: impl Into<String>,
        document: Document,
        expected_revision: Option<i64>,
    ) {
        self.writes.push(PlannedWrite::Put {
            collection: collection.into(),
            document_id: document_id.into(),
            document,
            expected_revision,
        });
    }

    pub fn delete(&mut self, collection: impl Into<String>, document_id: impl Into<String>) {
        self.writes.push(PlannedWrite::Delete {
            collection: collection.into(),
            document_id: document_id.into(),
        });
    }

    pub fn writes(&self) -> &[PlannedWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Remote document store keyed by `(collection, document id)`.
///
/// `put` is an unconditional upsert and `delete` is idempotent; revision
/// checks only exist inside [`DocumentStore::apply_batch`], where transitions
/// need them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Document>, StorageError>;

    async fn put(
        &self,
        collection: &str,
        document_id: &str,
        document: Document,
    ) -> Result<(), StorageError>;

    async fn delete(&self, collection: &str, document_id: &str) -> Result<(), StorageError>;

    /// Applies every write in order, atomically.
    async fn apply_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Ids of every document in a collection, sorted.
    async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_batch_preserves_write_order() {
        let mut batch = WriteBatch::new();
        batch.put("user_profiles", "u-1", doc! { "role": "supervisor" }, Some(3));
        batch.delete("department_supervisors", "parks__u-1");

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.writes()[0].collection(), "user_profiles");
        assert_eq!(batch.writes()[1].document_id(), "parks__u-1");
    }
}
