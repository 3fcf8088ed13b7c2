//! Supervisor assignment model - which departments a supervisor oversees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supervisor assignment entity, keyed by the user id.
///
/// Created on first promotion to supervisor and never deleted afterwards;
/// demotions flip `is_active` so assignment history is retained. The first
/// entry of `assigned_departments` is the home department, kept denormalized
/// in `home_department_id` for fast lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorAssignment {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub assigned_departments: Vec<String>,
    pub home_department_id: String,
    pub is_active: bool,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub revision: i64,
}

impl SupervisorAssignment {
    /// Create an active assignment. `departments` must already be
    /// normalized (non-empty, deduplicated); the first entry becomes the
    /// home department.
    pub fn new(user_id: String, departments: Vec<String>, assigned_by: String) -> Self {
        let now = Utc::now();
        let home_department_id = departments[0].clone();
        Self {
            user_id,
            assigned_departments: departments,
            home_department_id,
            is_active: true,
            assigned_by,
            assigned_at: now,
            last_updated: now,
            revision: 0,
        }
    }

    /// Copy with a replacement department set, reactivated if necessary.
    pub fn with_departments(&self, departments: Vec<String>, assigned_by: String) -> Self {
        Self {
            home_department_id: departments[0].clone(),
            assigned_departments: departments,
            is_active: true,
            assigned_by,
            last_updated: Utc::now(),
            revision: self.revision + 1,
            ..self.clone()
        }
    }

    /// Copy with `is_active` cleared. Departments are retained as history.
    pub fn deactivated(&self) -> Self {
        Self {
            is_active: false,
            last_updated: Utc::now(),
            revision: self.revision + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_takes_home_from_first_department() {
        let a = SupervisorAssignment::new(
            "u-1".into(),
            vec!["parks".into(), "sanitation".into()],
            "admin-1".into(),
        );
        assert_eq!(a.home_department_id, "parks");
        assert!(a.is_active);
        assert_eq!(a.revision, 0);
    }

    #[test]
    fn test_deactivated_keeps_departments() {
        let a = SupervisorAssignment::new("u-1".into(), vec!["parks".into()], "admin-1".into());
        let d = a.deactivated();
        assert!(!d.is_active);
        assert_eq!(d.assigned_departments, vec!["parks".to_string()]);
        assert_eq!(d.revision, 1);
    }
}
