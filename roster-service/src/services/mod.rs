//! Domain services: the role assignment engine and the read-side query.

pub mod query;
pub mod roles;

use thiserror::Error;

use portal_core::error::AppError;

use crate::models::Role;
use crate::storage::StorageError;

pub use query::{RoleQuery, RoleSnapshot};
pub use roles::{EngineSettings, RoleAssignmentEngine};

/// Failures surfaced by role transitions and queries.
#[derive(Debug, Error)]
pub enum RoleError {
    #[error("Invalid role transition from {from} to {requested}")]
    InvalidTransition { from: Role, requested: Role },

    #[error("User profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid department list: {0}")]
    InvalidDepartments(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Concurrent update rejected for {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for RoleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PermissionDenied(message) => RoleError::PermissionDenied(message),
            StorageError::Conflict { document_id, .. } => RoleError::Conflict(document_id),
            other => RoleError::Storage(other),
        }
    }
}

impl From<RoleError> for AppError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::InvalidTransition { from, requested } => AppError::BadRequest(
                anyhow::anyhow!("invalid role transition from {} to {}", from, requested),
            ),
            RoleError::ProfileNotFound(user_id) => {
                AppError::NotFound(anyhow::anyhow!("user profile {} not found", user_id))
            }
            RoleError::InvalidDepartments(message) => {
                AppError::BadRequest(anyhow::anyhow!(message))
            }
            RoleError::PermissionDenied(message) => {
                AppError::Forbidden(anyhow::anyhow!(message))
            }
            RoleError::Conflict(document_id) => {
                AppError::Conflict(anyhow::anyhow!("concurrent update on {}", document_id))
            }
            RoleError::Storage(storage) => AppError::from(storage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_permission_denied_keeps_its_class() {
        let err = RoleError::from(StorageError::PermissionDenied("missing role".into()));
        assert!(matches!(err, RoleError::PermissionDenied(_)));
    }

    #[test]
    fn test_storage_conflict_names_the_document() {
        let err = RoleError::from(StorageError::Conflict {
            collection: "user_profiles".into(),
            document_id: "u-1".into(),
        });
        match err {
            RoleError::Conflict(document_id) => assert_eq!(document_id, "u-1"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_transient_storage_errors_stay_wrapped() {
        let err = RoleError::from(StorageError::Unavailable("offline".into()));
        assert!(matches!(err, RoleError::Storage(_)));
    }

    #[test]
    fn test_role_errors_map_to_app_error_classes() {
        let invalid = RoleError::InvalidTransition {
            from: Role::Admin,
            requested: Role::Supervisor,
        };
        assert!(matches!(AppError::from(invalid), AppError::BadRequest(_)));
        assert!(matches!(
            AppError::from(RoleError::ProfileNotFound("u-1".into())),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(RoleError::PermissionDenied("denied".into())),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            AppError::from(RoleError::Storage(StorageError::Unavailable(
                "offline".into()
            ))),
            AppError::ServiceUnavailable
        ));
    }
}
