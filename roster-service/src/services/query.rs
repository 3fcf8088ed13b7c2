//! Read-side role lookup.

use serde::Serialize;

use crate::models::{collections, Role, SupervisorAssignment, UserProfile};
use crate::storage::SafeStorage;

use super::RoleError;

/// What the portal shell needs to route a signed-in user: the role, the home
/// department, and for supervisors the departments they oversee.
/// `is_active` mirrors the supervisor assignment's flag and is `false` for
/// every other role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSnapshot {
    pub role: Role,
    pub home_department_id: String,
    pub assigned_departments: Vec<String>,
    pub is_active: bool,
}

/// Read-only role lookup. No caching: every call reflects the last durable
/// write.
#[derive(Clone)]
pub struct RoleQuery {
    storage: SafeStorage,
}

impl RoleQuery {
    pub fn new(storage: SafeStorage) -> Self {
        Self { storage }
    }

    /// Resolves a user's current role, or `None` for an unknown user.
    ///
    /// A supervisor whose assignment record is missing or inactive gets an
    /// empty department list and a warning. That state is a recoverable
    /// anomaly the next transition repairs, not an error.
    pub async fn current_role(&self, user_id: &str) -> Result<Option<RoleSnapshot>, RoleError> {
        let profile: Option<UserProfile> = self
            .storage
            .read(collections::USER_PROFILES, user_id)
            .await?;
        let profile = match profile {
            Some(profile) => profile,
            None => return Ok(None),
        };

        let mut snapshot = RoleSnapshot {
            role: profile.role,
            home_department_id: profile.home_department_id,
            assigned_departments: Vec::new(),
            is_active: false,
        };

        if profile.role == Role::Supervisor {
            let assignment: Option<SupervisorAssignment> = self
                .storage
                .read(collections::SUPERVISOR_ASSIGNMENTS, user_id)
                .await?;
            match assignment {
                Some(assignment) if assignment.is_active => {
                    snapshot.assigned_departments = assignment.assigned_departments;
                    snapshot.is_active = true;
                }
                Some(_) => {
                    tracing::warn!(
                        user_id,
                        "Supervisor profile with inactive assignment record"
                    );
                }
                None => {
                    tracing::warn!(
                        user_id,
                        "Supervisor profile without an assignment record"
                    );
                }
            }
        }

        Ok(Some(snapshot))
    }
}
