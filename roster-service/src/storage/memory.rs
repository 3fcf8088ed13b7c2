//! In-memory document store used by tests and local development.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use bson::Document;
use tokio::sync::Mutex;

use super::error::StorageError;
use super::{DocumentStore, PlannedWrite, WriteBatch};

/// Mirrors the remote store's batch semantics: revision preconditions are
/// checked against pre-batch state and either every write applies or none
/// does. Failures can be scripted per method to exercise the retry and queue
/// paths without a network.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<(String, String), Document>>,
    scripted_failures: Mutex<HashMap<String, VecDeque<StorageError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error returned by the next call to `method` (one of `get`,
    /// `put`, `delete`, `apply_batch`, `list_ids`). Repeated calls stack and
    /// are consumed in order, one per store call.
    pub async fn fail_next(&self, method: &str, error: StorageError) {
        let mut scripted = self.scripted_failures.lock().await;
        scripted
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    async fn take_scripted(&self, method: &str) -> Option<StorageError> {
        let mut scripted = self.scripted_failures.lock().await;
        scripted.get_mut(method).and_then(|queue| queue.pop_front())
    }

    pub async fn contains(&self, collection: &str, document_id: &str) -> bool {
        let documents = self.documents.lock().await;
        documents.contains_key(&(collection.to_string(), document_id.to_string()))
    }

    pub async fn document_count(&self) -> usize {
        self.documents.lock().await.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Document>, StorageError> {
        if let Some(err) = self.take_scripted("get").await {
            return Err(err);
        }
        let documents = self.documents.lock().await;
        Ok(documents
            .get(&(collection.to_string(), document_id.to_string()))
            .cloned())
    }

    async fn put(
        &self,
        collection: &str,
        document_id: &str,
        document: Document,
    ) -> Result<(), StorageError> {
        if let Some(err) = self.take_scripted("put").await {
            return Err(err);
        }
        let mut documents = self.documents.lock().await;
        documents.insert((collection.to_string(), document_id.to_string()), document);
        Ok(())
    }

    async fn delete(&self, collection: &str, document_id: &str) -> Result<(), StorageError> {
        if let Some(err) = self.take_scripted("delete").await {
            return Err(err);
        }
        let mut documents = self.documents.lock().await;
        documents.remove(&(collection.to_string(), document_id.to_string()));
        Ok(())
    }

    async fn apply_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if let Some(err) = self.take_scripted("apply_batch").await {
            return Err(err);
        }
        let mut documents = self.documents.lock().await;

        // Every precondition is checked before the first write lands.
        for write in batch.writes() {
            if let PlannedWrite::Put {
                collection,
                document_id,
                expected_revision: Some(expected),
                ..
            } = write
            {
                let key = (collection.clone(), document_id.clone());
                let current = documents
                    .get(&key)
                    .and_then(|doc| doc.get_i64("revision").ok());
                if current != Some(*expected) {
                    return Err(StorageError::Conflict {
                        collection: collection.clone(),
                        document_id: document_id.clone(),
                    });
                }
            }
        }

        for write in batch.writes() {
            match write {
                PlannedWrite::Put {
                    collection,
                    document_id,
                    document,
                    ..
                } => {
                    documents.insert((collection.clone(), document_id.clone()), document.clone());
                }
                PlannedWrite::Delete {
                    collection,
                    document_id,
                } => {
                    documents.remove(&(collection.clone(), document_id.clone()));
                }
            }
        }
        Ok(())
    }

    async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        if let Some(err) = self.take_scripted("list_ids").await {
            return Err(err);
        }
        let documents = self.documents.lock().await;
        let mut ids: Vec<String> = documents
            .keys()
            .filter(|(name, _)| name == collection)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
