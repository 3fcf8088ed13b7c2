//! User profile model - one record per portal user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authorization role of a portal user.
///
/// `SystemAdmin` is assigned out-of-band and is terminal: no role
/// transition accepts it as a source or produces it as a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Supervisor,
    Admin,
    SystemAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
            Role::SystemAdmin => "system_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// User profile entity.
///
/// The role and home-department fields are owned by the role assignment
/// engine; name and status belong to unrelated profile-edit flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub home_department_id: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Monotonic revision, bumped by every engine write. Used as an
    /// optimistic-concurrency precondition in transition batches.
    #[serde(default)]
    pub revision: i64,
}

impl UserProfile {
    /// Create a new employee profile in the given home department.
    pub fn new(id: String, email: String, display_name: String, home_department_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            display_name,
            role: Role::Employee,
            home_department_id,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Copy with the role, home department and audit fields advanced for a
    /// transition write. The revision bump pairs with an
    /// `expected_revision` check on the old value.
    pub fn with_role(&self, role: Role, home_department_id: String) -> Self {
        Self {
            role,
            home_department_id,
            updated_at: Utc::now(),
            revision: self.revision + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::SystemAdmin).unwrap(),
            "\"system_admin\""
        );
        assert_eq!(Role::Supervisor.as_str(), "supervisor");
    }

    #[test]
    fn test_with_role_bumps_revision() {
        let profile = UserProfile::new(
            "u-1".into(),
            "pat@example.gov".into(),
            "Pat".into(),
            "general".into(),
        );
        let promoted = profile.with_role(Role::Supervisor, "public-works".into());
        assert_eq!(promoted.role, Role::Supervisor);
        assert_eq!(promoted.home_department_id, "public-works");
        assert_eq!(promoted.revision, profile.revision + 1);
        assert_eq!(promoted.created_at, profile.created_at);
    }
}
