//! Role assignment engine.
//!
//! Every transition follows the same shape: read current state, validate the
//! requested edge of the role state machine, build one write plan covering
//! the profile, the supervisor assignment, the per-department links and the
//! audit trail, then submit it as a single atomic batch. A transition either
//! lands completely or not at all.

use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::models::{
    collections, DepartmentLink, LinkPermission, Role, RoleAuditEntry, SupervisorAssignment,
    UserProfile,
};
use crate::storage::{SafeStorage, StorageError, WriteBatch};

use super::RoleError;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Home department written back when a profile leaves the supervisor role.
    pub default_department_id: String,
    /// Permission set stamped onto every link the engine creates.
    pub link_permissions: Vec<LinkPermission>,
}

impl EngineSettings {
    pub fn new(default_department_id: impl Into<String>) -> Self {
        Self {
            default_department_id: default_department_id.into(),
            link_permissions: LinkPermission::all(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_department_id.clone())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::new("general")
    }
}

/// Coordinates role transitions across the denormalized role records.
///
/// Valid edges: employee to supervisor or admin, supervisor to admin or
/// employee, admin to supervisor or employee, plus the supervisor self-loop
/// that replaces the department set. `system_admin` is assigned out-of-band
/// and never transitions here.
#[derive(Clone)]
pub struct RoleAssignmentEngine {
    storage: SafeStorage,
    settings: EngineSettings,
}

impl RoleAssignmentEngine {
    pub fn new(storage: SafeStorage, settings: EngineSettings) -> Self {
        Self { storage, settings }
    }

    /// Promotes an employee to supervisor over `departments`. The first
    /// department becomes the home department.
    pub async fn promote_to_supervisor(
        &self,
        user_id: &str,
        departments: Vec<String>,
        acting_user_id: &str,
    ) -> Result<(), RoleError> {
        let departments = normalize_departments(departments)?;
        let profile = self.load_profile(user_id).await?;
        if profile.role != Role::Employee {
            return Err(self.rejected(&profile, Role::Supervisor));
        }
        let assignment = self.load_assignment(user_id).await?;

        let batch = self.supervisor_batch(
            &profile,
            assignment.as_ref(),
            departments,
            Vec::new(),
            acting_user_id,
        )?;
        self.submit("promote_to_supervisor", user_id, batch).await
    }

    /// Promotes an employee or supervisor to admin. A supervisor's
    /// assignment is deactivated and its department links are deleted inside
    /// the same batch, so no window exists where an admin still appears as a
    /// department supervisor.
    pub async fn promote_to_admin(
        &self,
        user_id: &str,
        acting_user_id: &str,
    ) -> Result<(), RoleError> {
        let profile = self.load_profile(user_id).await?;
        if !matches!(profile.role, Role::Employee | Role::Supervisor) {
            return Err(self.rejected(&profile, Role::Admin));
        }
        let assignment = self.load_assignment(user_id).await?;

        let mut batch = WriteBatch::new();
        let updated = profile.with_role(Role::Admin, self.settings.default_department_id.clone());
        batch.put(
            collections::USER_PROFILES,
            user_id,
            to_document(&updated)?,
            Some(profile.revision),
        );
        if let Some(existing) = assignment.as_ref() {
            if existing.is_active {
                batch.put(
                    collections::SUPERVISOR_ASSIGNMENTS,
                    user_id,
                    to_document(&existing.deactivated())?,
                    Some(existing.revision),
                );
                for department_id in &existing.assigned_departments {
                    batch.delete(
                        collections::DEPARTMENT_SUPERVISORS,
                        DepartmentLink::document_id(department_id, user_id),
                    );
                }
            }
        }
        let audit = RoleAuditEntry::new(
            user_id.to_string(),
            acting_user_id.to_string(),
            profile.role,
            Role::Admin,
            Vec::new(),
        );
        batch.put(
            collections::ROLE_AUDIT,
            audit.id.clone(),
            to_document(&audit)?,
            None,
        );
        self.submit("promote_to_admin", user_id, batch).await
    }

    /// Demotes a supervisor or admin back to employee. Links are removed by
    /// sweeping the whole department roster, not just the recorded
    /// assignment set, so links that drifted out of sync are cleaned up too.
    pub async fn demote_to_employee(
        &self,
        user_id: &str,
        acting_user_id: &str,
    ) -> Result<(), RoleError> {
        let profile = self.load_profile(user_id).await?;
        if !matches!(profile.role, Role::Supervisor | Role::Admin) {
            return Err(self.rejected(&profile, Role::Employee));
        }
        let assignment = self.load_assignment(user_id).await?;
        let universe = self.department_universe(assignment.as_ref()).await?;

        let mut batch = WriteBatch::new();
        let updated =
            profile.with_role(Role::Employee, self.settings.default_department_id.clone());
        batch.put(
            collections::USER_PROFILES,
            user_id,
            to_document(&updated)?,
            Some(profile.revision),
        );
        if let Some(existing) = assignment.as_ref() {
            if existing.is_active {
                batch.put(
                    collections::SUPERVISOR_ASSIGNMENTS,
                    user_id,
                    to_document(&existing.deactivated())?,
                    Some(existing.revision),
                );
            }
        }
        for department_id in &universe {
            batch.delete(
                collections::DEPARTMENT_SUPERVISORS,
                DepartmentLink::document_id(department_id, user_id),
            );
        }
        let audit = RoleAuditEntry::new(
            user_id.to_string(),
            acting_user_id.to_string(),
            profile.role,
            Role::Employee,
            Vec::new(),
        );
        batch.put(
            collections::ROLE_AUDIT,
            audit.id.clone(),
            to_document(&audit)?,
            None,
        );
        self.submit("demote_to_employee", user_id, batch).await
    }

    /// Demotes an admin to supervisor over `departments`, reactivating the
    /// retained assignment record when one exists.
    pub async fn demote_to_supervisor(
        &self,
        user_id: &str,
        departments: Vec<String>,
        acting_user_id: &str,
    ) -> Result<(), RoleError> {
        let departments = normalize_departments(departments)?;
        let profile = self.load_profile(user_id).await?;
        if profile.role != Role::Admin {
            return Err(self.rejected(&profile, Role::Supervisor));
        }
        let assignment = self.load_assignment(user_id).await?;

        let batch = self.supervisor_batch(
            &profile,
            assignment.as_ref(),
            departments,
            Vec::new(),
            acting_user_id,
        )?;
        self.submit("demote_to_supervisor", user_id, batch).await
    }

    /// Replaces a supervisor's department set. Links for departments no
    /// longer assigned are deleted in the same batch; re-submitting the same
    /// set is a no-op apart from revision bumps and a fresh audit entry.
    pub async fn update_supervisor_departments(
        &self,
        user_id: &str,
        departments: Vec<String>,
        acting_user_id: &str,
    ) -> Result<(), RoleError> {
        let departments = normalize_departments(departments)?;
        let profile = self.load_profile(user_id).await?;
        if profile.role != Role::Supervisor {
            return Err(self.rejected(&profile, Role::Supervisor));
        }
        let assignment = self.load_assignment(user_id).await?;
        if assignment.is_none() {
            tracing::warn!(
                user_id,
                "Supervisor profile has no assignment record, recreating it"
            );
        }
        let universe = self.department_universe(assignment.as_ref()).await?;
        let stale = universe
            .into_iter()
            .filter(|department_id| !departments.contains(department_id))
            .collect();

        let batch = self.supervisor_batch(
            &profile,
            assignment.as_ref(),
            departments,
            stale,
            acting_user_id,
        )?;
        self.submit("update_supervisor_departments", user_id, batch)
            .await
    }

    async fn load_profile(&self, user_id: &str) -> Result<UserProfile, RoleError> {
        let profile: Option<UserProfile> = self
            .storage
            .read(collections::USER_PROFILES, user_id)
            .await?;
        profile.ok_or_else(|| RoleError::ProfileNotFound(user_id.to_string()))
    }

    async fn load_assignment(
        &self,
        user_id: &str,
    ) -> Result<Option<SupervisorAssignment>, RoleError> {
        Ok(self
            .storage
            .read(collections::SUPERVISOR_ASSIGNMENTS, user_id)
            .await?)
    }

    /// Ids of every department the user could conceivably hold a link for:
    /// the department roster plus whatever the assignment records. Drifted
    /// links outside the recorded assignment still fall inside this set.
    async fn department_universe(
        &self,
        assignment: Option<&SupervisorAssignment>,
    ) -> Result<BTreeSet<String>, RoleError> {
        let mut universe: BTreeSet<String> = self
            .storage
            .list_ids(collections::DEPARTMENTS)
            .await?
            .into_iter()
            .collect();
        if let Some(existing) = assignment {
            universe.extend(existing.assigned_departments.iter().cloned());
        }
        Ok(universe)
    }

    /// Write plan shared by every transition that lands on supervisor:
    /// profile put, assignment upsert, stale link deletes, one link per
    /// department, audit entry. Profile and assignment puts carry the
    /// pre-read revisions as preconditions.
    fn supervisor_batch(
        &self,
        profile: &UserProfile,
        assignment: Option<&SupervisorAssignment>,
        departments: Vec<String>,
        stale_departments: Vec<String>,
        acting_user_id: &str,
    ) -> Result<WriteBatch, RoleError> {
        let mut batch = WriteBatch::new();

        let updated = profile.with_role(Role::Supervisor, departments[0].clone());
        batch.put(
            collections::USER_PROFILES,
            profile.id.as_str(),
            to_document(&updated)?,
            Some(profile.revision),
        );

        match assignment {
            Some(existing) => {
                let next =
                    existing.with_departments(departments.clone(), acting_user_id.to_string());
                batch.put(
                    collections::SUPERVISOR_ASSIGNMENTS,
                    profile.id.as_str(),
                    to_document(&next)?,
                    Some(existing.revision),
                );
            }
            None => {
                let created = SupervisorAssignment::new(
                    profile.id.clone(),
                    departments.clone(),
                    acting_user_id.to_string(),
                );
                batch.put(
                    collections::SUPERVISOR_ASSIGNMENTS,
                    profile.id.as_str(),
                    to_document(&created)?,
                    None,
                );
            }
        }

        for department_id in &stale_departments {
            batch.delete(
                collections::DEPARTMENT_SUPERVISORS,
                DepartmentLink::document_id(department_id, &profile.id),
            );
        }

        for department_id in &departments {
            let link = DepartmentLink::new(
                department_id.clone(),
                profile.id.clone(),
                self.settings.link_permissions.clone(),
                acting_user_id.to_string(),
            );
            batch.put(
                collections::DEPARTMENT_SUPERVISORS,
                link.id.clone(),
                to_document(&link)?,
                None,
            );
        }

        let audit = RoleAuditEntry::new(
            profile.id.clone(),
            acting_user_id.to_string(),
            profile.role,
            Role::Supervisor,
            departments,
        );
        batch.put(
            collections::ROLE_AUDIT,
            audit.id.clone(),
            to_document(&audit)?,
            None,
        );

        Ok(batch)
    }

    async fn submit(
        &self,
        transition: &str,
        user_id: &str,
        batch: WriteBatch,
    ) -> Result<(), RoleError> {
        let writes = batch.len();
        match self.storage.apply_batch(batch).await {
            Ok(()) => {
                metrics::counter!("role_transitions_total", "transition" => transition.to_string())
                    .increment(1);
                tracing::info!(user_id, transition, writes, "Role transition committed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(user_id, transition, error = %err, "Role transition failed");
                Err(RoleError::from(err))
            }
        }
    }

    fn rejected(&self, profile: &UserProfile, requested: Role) -> RoleError {
        tracing::warn!(
            user_id = %profile.id,
            from = %profile.role,
            requested = %requested,
            "Rejected role transition"
        );
        RoleError::InvalidTransition {
            from: profile.role,
            requested,
        }
    }
}

/// Trims, deduplicates (first occurrence wins, so the home department keeps
/// its position) and rejects empty input. Runs before any read.
fn normalize_departments(departments: Vec<String>) -> Result<Vec<String>, RoleError> {
    let mut normalized: Vec<String> = Vec::with_capacity(departments.len());
    for raw in departments {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RoleError::InvalidDepartments(
                "department ids must be non-empty".to_string(),
            ));
        }
        if !normalized.iter().any(|seen| seen == trimmed) {
            normalized.push(trimmed.to_string());
        }
    }
    if normalized.is_empty() {
        return Err(RoleError::InvalidDepartments(
            "at least one department is required".to_string(),
        ));
    }
    Ok(normalized)
}

fn to_document<T: serde::Serialize>(value: &T) -> Result<bson::Document, RoleError> {
    Ok(bson::to_document(value).map_err(StorageError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Department;
    use crate::storage::memory::MemoryStore;
    use crate::storage::queue::{MemoryQueueStore, PendingQueue};
    use crate::storage::{DocumentStore, RetryPolicy};
    use std::sync::Arc;
    use std::time::Duration;

    async fn engine() -> (Arc<MemoryStore>, SafeStorage, RoleAssignmentEngine) {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(
            PendingQueue::load(Arc::new(MemoryQueueStore::new()), 3)
                .await
                .unwrap(),
        );
        let policy = RetryPolicy::new(
            2,
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::ZERO,
        );
        let safe = SafeStorage::new(store.clone(), queue, policy);
        let engine = RoleAssignmentEngine::new(safe.clone(), EngineSettings::default());
        (store, safe, engine)
    }

    async fn seed_employee(safe: &SafeStorage, user_id: &str) -> UserProfile {
        let profile = UserProfile::new(
            user_id.to_string(),
            format!("{}@city.gov", user_id),
            "Sam".to_string(),
            "general".to_string(),
        );
        safe.create(collections::USER_PROFILES, user_id, &profile)
            .await
            .unwrap();
        profile
    }

    async fn seed_departments(safe: &SafeStorage, ids: &[&str]) {
        for id in ids {
            let department = Department::new(id.to_string(), format!("Dept {}", id));
            safe.create(collections::DEPARTMENTS, id, &department)
                .await
                .unwrap();
        }
    }

    async fn read_profile(safe: &SafeStorage, user_id: &str) -> UserProfile {
        safe.read(collections::USER_PROFILES, user_id)
            .await
            .unwrap()
            .unwrap()
    }

    async fn read_assignment(safe: &SafeStorage, user_id: &str) -> SupervisorAssignment {
        safe.read(collections::SUPERVISOR_ASSIGNMENTS, user_id)
            .await
            .unwrap()
            .unwrap()
    }

    async fn link_ids(safe: &SafeStorage) -> Vec<String> {
        safe.list_ids(collections::DEPARTMENT_SUPERVISORS)
            .await
            .unwrap()
    }

    async fn audit_count(safe: &SafeStorage) -> usize {
        safe.list_ids(collections::ROLE_AUDIT).await.unwrap().len()
    }

    #[test]
    fn test_settings_from_config_pick_up_default_department() {
        let config = EngineConfig {
            default_department_id: "city-hall".to_string(),
        };
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.default_department_id, "city-hall");
        assert_eq!(settings.link_permissions, LinkPermission::all());
    }

    #[tokio::test]
    async fn test_promote_to_supervisor_writes_all_records() {
        let (_store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;

        engine
            .promote_to_supervisor(
                "u-1",
                vec!["parks".into(), "sanitation".into()],
                "admin-9",
            )
            .await
            .unwrap();

        let profile = read_profile(&safe, "u-1").await;
        assert_eq!(profile.role, Role::Supervisor);
        assert_eq!(profile.home_department_id, "parks");
        assert_eq!(profile.revision, 1);

        let assignment = read_assignment(&safe, "u-1").await;
        assert!(assignment.is_active);
        assert_eq!(
            assignment.assigned_departments,
            vec!["parks".to_string(), "sanitation".to_string()]
        );
        assert_eq!(assignment.assigned_by, "admin-9");

        assert_eq!(
            link_ids(&safe).await,
            vec!["parks__u-1".to_string(), "sanitation__u-1".to_string()]
        );
        assert_eq!(audit_count(&safe).await, 1);
    }

    #[tokio::test]
    async fn test_promote_to_supervisor_rejected_for_admin_writes_nothing() {
        let (store, safe, engine) = engine().await;
        let employee = seed_employee(&safe, "u-1").await;
        let admin = employee.with_role(Role::Admin, "general".into());
        safe.write(collections::USER_PROFILES, "u-1", &admin)
            .await
            .unwrap();
        let before = store.document_count().await;

        let err = engine
            .promote_to_supervisor("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RoleError::InvalidTransition {
                from: Role::Admin,
                requested: Role::Supervisor
            }
        ));
        assert_eq!(store.document_count().await, before);
    }

    #[tokio::test]
    async fn test_departments_are_trimmed_and_deduplicated() {
        let (_store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;

        engine
            .promote_to_supervisor(
                "u-1",
                vec![" parks ".into(), "parks".into(), "roads".into()],
                "admin-9",
            )
            .await
            .unwrap();

        let assignment = read_assignment(&safe, "u-1").await;
        assert_eq!(
            assignment.assigned_departments,
            vec!["parks".to_string(), "roads".to_string()]
        );
        assert_eq!(assignment.home_department_id, "parks");
    }

    #[tokio::test]
    async fn test_empty_departments_rejected_before_any_read() {
        let (_store, _safe, engine) = engine().await;
        // No profile seeded: validation must fire first.
        let err = engine
            .promote_to_supervisor("missing", Vec::new(), "admin-9")
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::InvalidDepartments(_)));

        let err = engine
            .update_supervisor_departments("missing", vec!["  ".into()], "admin-9")
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::InvalidDepartments(_)));
    }

    #[tokio::test]
    async fn test_unknown_user_is_profile_not_found() {
        let (_store, _safe, engine) = engine().await;
        let err = engine
            .promote_to_admin("ghost", "admin-9")
            .await
            .unwrap_err();
        match err {
            RoleError::ProfileNotFound(user_id) => assert_eq!(user_id, "ghost"),
            other => panic!("expected profile-not-found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_promote_to_admin_from_employee_has_no_assignment_writes() {
        let (store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;

        engine.promote_to_admin("u-1", "admin-9").await.unwrap();

        let profile = read_profile(&safe, "u-1").await;
        assert_eq!(profile.role, Role::Admin);
        assert!(!store.contains(collections::SUPERVISOR_ASSIGNMENTS, "u-1").await);
        assert_eq!(audit_count(&safe).await, 1);
    }

    #[tokio::test]
    async fn test_promote_to_admin_deactivates_assignment_and_deletes_links() {
        let (_store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;
        engine
            .promote_to_supervisor("u-1", vec!["parks".into(), "roads".into()], "admin-9")
            .await
            .unwrap();

        engine.promote_to_admin("u-1", "admin-9").await.unwrap();

        let profile = read_profile(&safe, "u-1").await;
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(profile.home_department_id, "general");

        let assignment = read_assignment(&safe, "u-1").await;
        assert!(!assignment.is_active);
        // Department history survives deactivation.
        assert_eq!(
            assignment.assigned_departments,
            vec!["parks".to_string(), "roads".to_string()]
        );

        assert!(link_ids(&safe).await.is_empty());
        assert_eq!(audit_count(&safe).await, 2);
    }

    #[tokio::test]
    async fn test_demote_to_employee_sweeps_drifted_links() {
        let (store, safe, engine) = engine().await;
        seed_departments(&safe, &["parks", "roads", "water"]).await;
        seed_employee(&safe, "u-1").await;
        seed_employee(&safe, "u-2").await;
        engine
            .promote_to_supervisor("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap();
        engine
            .promote_to_supervisor("u-2", vec!["water".into()], "admin-9")
            .await
            .unwrap();
        // A link with no backing assignment entry, as left by an out-of-band
        // writer.
        store
            .put(
                collections::DEPARTMENT_SUPERVISORS,
                "roads__u-1",
                bson::to_document(&DepartmentLink::new(
                    "roads".into(),
                    "u-1".into(),
                    LinkPermission::all(),
                    "script".into(),
                ))
                .unwrap(),
            )
            .await
            .unwrap();

        engine.demote_to_employee("u-1", "admin-9").await.unwrap();

        let profile = read_profile(&safe, "u-1").await;
        assert_eq!(profile.role, Role::Employee);
        assert_eq!(profile.home_department_id, "general");

        let assignment = read_assignment(&safe, "u-1").await;
        assert!(!assignment.is_active);
        assert_eq!(assignment.assigned_departments, vec!["parks".to_string()]);

        // Both the recorded and the drifted link are gone; the other
        // supervisor's link is untouched.
        assert_eq!(link_ids(&safe).await, vec!["water__u-2".to_string()]);
    }

    #[tokio::test]
    async fn test_demote_to_supervisor_reactivates_retained_assignment() {
        let (_store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;
        engine
            .promote_to_supervisor("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap();
        engine.promote_to_admin("u-1", "admin-9").await.unwrap();

        engine
            .demote_to_supervisor("u-1", vec!["roads".into()], "admin-9")
            .await
            .unwrap();

        let profile = read_profile(&safe, "u-1").await;
        assert_eq!(profile.role, Role::Supervisor);
        assert_eq!(profile.home_department_id, "roads");

        let assignment = read_assignment(&safe, "u-1").await;
        assert!(assignment.is_active);
        assert_eq!(assignment.assigned_departments, vec!["roads".to_string()]);
        assert_eq!(link_ids(&safe).await, vec!["roads__u-1".to_string()]);
    }

    #[tokio::test]
    async fn test_update_replaces_links_and_is_idempotent() {
        let (_store, safe, engine) = engine().await;
        seed_departments(&safe, &["parks", "roads"]).await;
        seed_employee(&safe, "u-1").await;
        engine
            .promote_to_supervisor("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap();

        engine
            .update_supervisor_departments("u-1", vec!["roads".into()], "admin-9")
            .await
            .unwrap();
        assert_eq!(link_ids(&safe).await, vec!["roads__u-1".to_string()]);

        engine
            .update_supervisor_departments("u-1", vec!["roads".into()], "admin-9")
            .await
            .unwrap();
        assert_eq!(link_ids(&safe).await, vec!["roads__u-1".to_string()]);

        let assignment = read_assignment(&safe, "u-1").await;
        assert_eq!(assignment.assigned_departments, vec!["roads".to_string()]);
        assert_eq!(assignment.home_department_id, "roads");
        // One promote plus two updates.
        assert_eq!(audit_count(&safe).await, 3);
    }

    #[tokio::test]
    async fn test_update_rejected_for_employee() {
        let (_store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;

        let err = engine
            .update_supervisor_departments("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RoleError::InvalidTransition {
                from: Role::Employee,
                requested: Role::Supervisor
            }
        ));
    }

    #[tokio::test]
    async fn test_system_admin_is_terminal() {
        let (_store, safe, engine) = engine().await;
        let mut profile = seed_employee(&safe, "u-1").await;
        profile.role = Role::SystemAdmin;
        safe.write(collections::USER_PROFILES, "u-1", &profile)
            .await
            .unwrap();

        assert!(matches!(
            engine.demote_to_employee("u-1", "admin-9").await,
            Err(RoleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            engine.promote_to_admin("u-1", "admin-9").await,
            Err(RoleError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_update_surfaces_as_conflict() {
        let (store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;
        store
            .fail_next(
                "apply_batch",
                StorageError::Conflict {
                    collection: collections::USER_PROFILES.to_string(),
                    document_id: "u-1".to_string(),
                },
            )
            .await;

        let err = engine
            .promote_to_supervisor("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap_err();
        match err {
            RoleError::Conflict(document_id) => assert_eq!(document_id, "u-1"),
            other => panic!("expected conflict, got {:?}", other),
        }
        // The batch never landed.
        assert_eq!(read_profile(&safe, "u-1").await.role, Role::Employee);
    }

    #[tokio::test]
    async fn test_permission_denied_batch_maps_to_role_error() {
        let (store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;
        store
            .fail_next(
                "apply_batch",
                StorageError::PermissionDenied("caller lacks roster admin".into()),
            )
            .await;

        let err = engine
            .promote_to_supervisor("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap_err();
        assert!(matches!(err, RoleError::PermissionDenied(_)));
        assert!(safe.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_full_lifecycle_leaves_one_audit_entry_per_transition() {
        let (_store, safe, engine) = engine().await;
        seed_employee(&safe, "u-1").await;

        engine
            .promote_to_supervisor("u-1", vec!["parks".into()], "admin-9")
            .await
            .unwrap();
        engine.promote_to_admin("u-1", "admin-9").await.unwrap();
        engine.demote_to_employee("u-1", "admin-9").await.unwrap();

        assert_eq!(audit_count(&safe).await, 3);
        let profile = read_profile(&safe, "u-1").await;
        assert_eq!(profile.role, Role::Employee);
        assert_eq!(profile.revision, 3);
    }
}
