//! Department supervisor link - denormalized per-department supervision record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Permission granted to a supervisor on a department they oversee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPermission {
    Read,
    Write,
    ManageReports,
}

impl LinkPermission {
    /// The full permission set stamped onto new links by default.
    pub fn all() -> Vec<LinkPermission> {
        vec![
            LinkPermission::Read,
            LinkPermission::Write,
            LinkPermission::ManageReports,
        ]
    }
}

/// Link entity keyed by `(department_id, user_id)`.
///
/// One exists per department a supervisor currently oversees, so "who
/// supervises department X" resolves without scanning all users. A link
/// exists iff the department is in the user's active assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentLink {
    #[serde(rename = "_id")]
    pub id: String,
    pub department_id: String,
    pub user_id: String,
    pub active: bool,
    pub permissions: Vec<LinkPermission>,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

impl DepartmentLink {
    pub fn new(
        department_id: String,
        user_id: String,
        permissions: Vec<LinkPermission>,
        assigned_by: String,
    ) -> Self {
        Self {
            id: Self::document_id(&department_id, &user_id),
            department_id,
            user_id,
            active: true,
            permissions,
            assigned_by,
            assigned_at: Utc::now(),
        }
    }

    /// Compound document id for the `(department, user)` pair.
    pub fn document_id(department_id: &str, user_id: &str) -> String {
        format!("{}__{}", department_id, user_id)
    }
}
