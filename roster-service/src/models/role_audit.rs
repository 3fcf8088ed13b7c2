//! Role audit model - append-only record of role transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user_profile::Role;

/// One audit entry per completed role transition, written inside the same
/// atomic batch as the transition itself. Never read by the query path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAuditEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub acting_user_id: String,
    pub from_role: Role,
    pub to_role: Role,
    /// Department set after the transition; empty for non-supervisor targets.
    pub departments: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl RoleAuditEntry {
    pub fn new(
        user_id: String,
        acting_user_id: String,
        from_role: Role,
        to_role: Role,
        departments: Vec<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            acting_user_id,
            from_role,
            to_role,
            departments,
            recorded_at: Utc::now(),
        }
    }
}
