//! MongoDB-backed document store.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::options::{IndexOptions, ReplaceOptions};
use mongodb::{Client as MongoClient, ClientSession, Collection, Database, IndexModel};

use crate::models::collections;

use super::error::StorageError;
use super::{DocumentStore, PlannedWrite, WriteBatch};

/// Remote store keyed by `(collection, _id)`. Multi-document batches run in a
/// causally-consistent session transaction, so revision preconditions and
/// atomicity hold across collections.
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StorageError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            StorageError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), StorageError> {
        tracing::info!("Creating MongoDB indexes for roster-service");

        // Index on role for listing users by authorization level
        let role_index = IndexModel::builder()
            .keys(doc! { "role": 1 })
            .options(IndexOptions::builder().name("role_idx".to_string()).build())
            .build();

        self.collection(collections::USER_PROFILES)
            .create_index(role_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create role index: {}", e);
                StorageError::from(e)
            })?;

        // Index on is_active for finding live assignments
        let active_index = IndexModel::builder()
            .keys(doc! { "is_active": 1 })
            .options(
                IndexOptions::builder()
                    .name("is_active_idx".to_string())
                    .build(),
            )
            .build();

        self.collection(collections::SUPERVISOR_ASSIGNMENTS)
            .create_index(active_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create is_active index: {}", e);
                StorageError::from(e)
            })?;

        // Index on user_id for the per-user link sweep
        let user_index = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_id_idx".to_string())
                    .build(),
            )
            .build();

        self.collection(collections::DEPARTMENT_SUPERVISORS)
            .create_index(user_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create user_id index: {}", e);
                StorageError::from(e)
            })?;

        // Compound index answering "who supervises department X"
        let department_index = IndexModel::builder()
            .keys(doc! { "department_id": 1, "active": 1 })
            .options(
                IndexOptions::builder()
                    .name("department_active_idx".to_string())
                    .build(),
            )
            .build();

        self.collection(collections::DEPARTMENT_SUPERVISORS)
            .create_index(department_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create department_id index: {}", e);
                StorageError::from(e)
            })?;

        // Index on user_id + recorded_at for audit history queries (recent first)
        let audit_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "recorded_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_recorded_idx".to_string())
                    .build(),
            )
            .build();

        self.collection(collections::ROLE_AUDIT)
            .create_index(audit_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create role audit index: {}", e);
                StorageError::from(e)
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StorageError::from(e)
            })?;
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    async fn apply_write(
        &self,
        session: &mut ClientSession,
        write: &PlannedWrite,
    ) -> Result<(), StorageError> {
        match write {
            PlannedWrite::Put {
                collection,
                document_id,
                document,
                expected_revision,
            } => {
                let target = self.collection(collection);
                match expected_revision {
                    Some(revision) => {
                        let filter = doc! { "_id": document_id.as_str(), "revision": *revision };
                        let result = target
                            .replace_one_with_session(filter, document, None, session)
                            .await?;
                        if result.matched_count == 0 {
                            return Err(StorageError::Conflict {
                                collection: collection.clone(),
                                document_id: document_id.clone(),
                            });
                        }
                    }
                    None => {
                        let options = ReplaceOptions::builder().upsert(true).build();
                        target
                            .replace_one_with_session(
                                doc! { "_id": document_id.as_str() },
                                document,
                                options,
                                session,
                            )
                            .await?;
                    }
                }
                Ok(())
            }
            PlannedWrite::Delete {
                collection,
                document_id,
            } => {
                self.collection(collection)
                    .delete_one_with_session(doc! { "_id": document_id.as_str() }, None, session)
                    .await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Document>, StorageError> {
        let found = self
            .collection(collection)
            .find_one(doc! { "_id": document_id }, None)
            .await?;
        Ok(found)
    }

    async fn put(
        &self,
        collection: &str,
        document_id: &str,
        document: Document,
    ) -> Result<(), StorageError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection(collection)
            .replace_one(doc! { "_id": document_id }, &document, options)
            .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, document_id: &str) -> Result<(), StorageError> {
        self.collection(collection)
            .delete_one(doc! { "_id": document_id }, None)
            .await?;
        Ok(())
    }

    async fn apply_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        for write in batch.writes() {
            if let Err(err) = self.apply_write(&mut session, write).await {
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::warn!(error = %abort_err, "Failed to abort batch transaction");
                }
                return Err(err);
            }
        }

        session.commit_transaction().await?;
        Ok(())
    }

    async fn list_ids(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        let values = self
            .collection(collection)
            .distinct("_id", None, None)
            .await?;
        let mut ids: Vec<String> = values
            .into_iter()
            .filter_map(|value| match value {
                Bson::String(id) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}
