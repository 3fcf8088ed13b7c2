//! Pending operation model - a write awaiting delivery to the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of write held in the pending-operation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuedOperation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for QueuedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueuedOperation::Create => write!(f, "create"),
            QueuedOperation::Update => write!(f, "update"),
            QueuedOperation::Delete => write!(f, "delete"),
        }
    }
}

/// A durable queue entry for a write that exhausted its retries.
///
/// Entries are replayed in insertion order. Multiple entries for the same
/// document can coexist; they are never merged or compacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: String,
    pub operation: QueuedOperation,
    pub collection: String,
    pub document_id: String,
    /// JSON form of the document for `create`/`update`; `None` for deletes.
    pub payload: Option<serde_json::Value>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl PendingOperation {
    pub fn new(
        operation: QueuedOperation,
        collection: String,
        document_id: String,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            collection,
            document_id,
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }
}
