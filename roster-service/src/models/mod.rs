pub mod department;
pub mod department_link;
pub mod pending_operation;
pub mod role_audit;
pub mod supervisor_assignment;
pub mod user_profile;

pub use department::Department;
pub use department_link::{DepartmentLink, LinkPermission};
pub use pending_operation::{PendingOperation, QueuedOperation};
pub use role_audit::RoleAuditEntry;
pub use supervisor_assignment::SupervisorAssignment;
pub use user_profile::{Role, UserProfile, UserStatus};

/// Collection names for the portal's denormalized role records.
pub mod collections {
    pub const USER_PROFILES: &str = "user_profiles";
    pub const SUPERVISOR_ASSIGNMENTS: &str = "supervisor_assignments";
    pub const DEPARTMENT_SUPERVISORS: &str = "department_supervisors";
    pub const DEPARTMENTS: &str = "departments";
    pub const ROLE_AUDIT: &str = "role_audit";
}
