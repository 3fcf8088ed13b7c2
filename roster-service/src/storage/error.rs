use thiserror::Error;

/// Failure classification for remote document-store calls.
///
/// The retry executor only ever re-attempts errors for which
/// [`StorageError::is_retryable`] returns true; everything else aborts the
/// call on the first attempt.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Write conflict on {collection}/{document_id}")]
    Conflict {
        collection: String,
        document_id: String,
    },

    #[error("Document not found: {collection}/{document_id}")]
    NotFound {
        collection: String,
        document_id: String,
    },

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        /// Whether the failed write was captured in the pending queue.
        queued: bool,
        #[source]
        source: Box<StorageError>,
    },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Transient connectivity failures are retried; everything else is
    /// deterministic and surfaces on the first attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::Timeout(_) | StorageError::Backend(_)
        )
    }

    pub fn was_queued(&self) -> bool {
        matches!(self, StorageError::RetriesExhausted { queued: true, .. })
    }
}

impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        // Transaction errors labelled transient are safe to re-run wholesale.
        if err.contains_label("TransientTransactionError")
            || err.contains_label("UnknownTransactionCommitResult")
        {
            return StorageError::Unavailable(err.to_string());
        }

        match err.kind.as_ref() {
            ErrorKind::Authentication { .. } => StorageError::Unauthenticated(err.to_string()),
            ErrorKind::Command(command) => match command.code {
                // 13 Unauthorized, 18 AuthenticationFailed, 50 MaxTimeMSExpired
                13 => StorageError::PermissionDenied(command.message.clone()),
                18 => StorageError::Unauthenticated(command.message.clone()),
                50 => StorageError::Timeout(command.message.clone()),
                _ => StorageError::Backend(command.message.clone()),
            },
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. } => StorageError::Unavailable(err.to_string()),
            ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
                StorageError::Serialization(err.to_string())
            }
            _ => StorageError::Backend(err.to_string()),
        }
    }
}

impl From<bson::ser::Error> for StorageError {
    fn from(err: bson::ser::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for StorageError {
    fn from(err: bson::de::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StorageError> for portal_core::error::AppError {
    fn from(err: StorageError) -> Self {
        use portal_core::error::AppError;
        match err {
            StorageError::PermissionDenied(message) => AppError::Forbidden(anyhow::anyhow!(message)),
            StorageError::Unauthenticated(message) => {
                AppError::Unauthorized(anyhow::anyhow!(message))
            }
            StorageError::NotFound {
                collection,
                document_id,
            } => AppError::NotFound(anyhow::anyhow!("{}/{} not found", collection, document_id)),
            StorageError::Conflict {
                collection,
                document_id,
            } => AppError::Conflict(anyhow::anyhow!(
                "concurrent update on {}/{}",
                collection,
                document_id
            )),
            StorageError::Unavailable(_)
            | StorageError::Timeout(_)
            | StorageError::RetriesExhausted { .. } => AppError::ServiceUnavailable,
            StorageError::Serialization(message) => {
                AppError::InternalError(anyhow::anyhow!(message))
            }
            StorageError::Backend(message) => AppError::DatabaseError(anyhow::anyhow!(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classes_are_retryable() {
        assert!(StorageError::Unavailable("connection refused".into()).is_retryable());
        assert!(StorageError::Timeout("deadline exceeded".into()).is_retryable());
        assert!(StorageError::Backend("write concern error".into()).is_retryable());
    }

    #[test]
    fn test_fatal_classes_are_not_retryable() {
        assert!(!StorageError::PermissionDenied("missing role".into()).is_retryable());
        assert!(!StorageError::Unauthenticated("no session".into()).is_retryable());
        assert!(!StorageError::Conflict {
            collection: "user_profiles".into(),
            document_id: "u-1".into(),
        }
        .is_retryable());
        assert!(!StorageError::Serialization("bad payload".into()).is_retryable());
    }

    #[test]
    fn test_exhaustion_is_terminal() {
        let err = StorageError::RetriesExhausted {
            attempts: 5,
            queued: true,
            source: Box::new(StorageError::Unavailable("offline".into())),
        };
        assert!(!err.is_retryable());
        assert!(err.was_queued());
    }
}
