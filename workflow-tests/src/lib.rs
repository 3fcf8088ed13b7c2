//! Role lifecycle workflow tests library.
//!
//! Test infrastructure for exercising the role assignment engine end to end:
//! a context wiring the engine, query and safe storage over the in-memory
//! document store, plus seeding helpers and the consistency check shared by
//! the test files under `tests/`.

use std::sync::{Arc, Once};
use std::time::Duration;

use roster_service::models::{
    collections, Department, DepartmentLink, Role, SupervisorAssignment, UserProfile,
};
use roster_service::services::{EngineSettings, RoleAssignmentEngine, RoleQuery};
use roster_service::storage::{
    MemoryQueueStore, MemoryStore, PendingQueue, QueueStore, RetryPolicy, SafeStorage,
};

pub use roster_service::storage::FileQueueStore;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,roster_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// How many replay passes a queued operation survives in tests.
pub const REPLAY_CEILING: u32 = 3;

/// Context for role workflow tests.
///
/// Each test creates its own context, so stores never leak state between
/// tests. The retry policy uses millisecond delays to keep failure-path
/// tests fast.
pub struct PortalTestContext {
    pub store: Arc<MemoryStore>,
    pub storage: SafeStorage,
    pub engine: RoleAssignmentEngine,
    pub query: RoleQuery,
}

impl PortalTestContext {
    pub async fn new() -> Self {
        Self::with_queue_store(Arc::new(MemoryQueueStore::new())).await
    }

    /// Builds the context over a caller-provided queue store, letting tests
    /// exercise the durable file-backed queue.
    pub async fn with_queue_store(queue_store: Arc<dyn QueueStore>) -> Self {
        init_tracing();

        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(
            PendingQueue::load(queue_store, REPLAY_CEILING)
                .await
                .expect("pending queue should load"),
        );
        let policy = RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(4),
            Duration::ZERO,
        );
        let storage = SafeStorage::new(store.clone(), queue, policy);
        let engine = RoleAssignmentEngine::new(storage.clone(), EngineSettings::default());
        let query = RoleQuery::new(storage.clone());

        Self {
            store,
            storage,
            engine,
            query,
        }
    }

    /// Seeds an active employee profile.
    pub async fn seed_employee(&self, user_id: &str) -> UserProfile {
        let profile = UserProfile::new(
            user_id.to_string(),
            format!("{}@city.gov", user_id),
            format!("User {}", user_id),
            "general".to_string(),
        );
        self.storage
            .create(collections::USER_PROFILES, user_id, &profile)
            .await
            .expect("seeding a profile should succeed");
        profile
    }

    /// Seeds the department roster the link sweep scans.
    pub async fn seed_departments(&self, ids: &[&str]) {
        for id in ids {
            let department = Department::new(id.to_string(), format!("Dept {}", id));
            self.storage
                .create(collections::DEPARTMENTS, id, &department)
                .await
                .expect("seeding a department should succeed");
        }
    }

    pub async fn profile(&self, user_id: &str) -> UserProfile {
        self.storage
            .read(collections::USER_PROFILES, user_id)
            .await
            .expect("profile read should succeed")
            .expect("profile should exist")
    }

    pub async fn assignment(&self, user_id: &str) -> Option<SupervisorAssignment> {
        self.storage
            .read(collections::SUPERVISOR_ASSIGNMENTS, user_id)
            .await
            .expect("assignment read should succeed")
    }

    /// Link document ids held by one user, sorted.
    pub async fn links_for(&self, user_id: &str) -> Vec<String> {
        let suffix = format!("__{}", user_id);
        self.storage
            .list_ids(collections::DEPARTMENT_SUPERVISORS)
            .await
            .expect("link scan should succeed")
            .into_iter()
            .filter(|id| id.ends_with(&suffix))
            .collect()
    }

    pub async fn audit_count(&self) -> usize {
        self.storage
            .list_ids(collections::ROLE_AUDIT)
            .await
            .expect("audit scan should succeed")
            .len()
    }

    /// Asserts that the three denormalized records agree for one user:
    /// a supervisor has an active assignment whose departments exactly match
    /// the links and whose first department is the home department; any
    /// other role has no active assignment and no links.
    pub async fn assert_records_consistent(&self, user_id: &str) {
        let profile = self.profile(user_id).await;
        let assignment = self.assignment(user_id).await;
        let links = self.links_for(user_id).await;

        if profile.role == Role::Supervisor {
            let assignment = assignment.expect("supervisor should have an assignment record");
            assert!(
                assignment.is_active,
                "supervisor {} has an inactive assignment",
                user_id
            );
            assert_eq!(
                assignment.home_department_id, assignment.assigned_departments[0],
                "assignment home department must be the first assigned department"
            );
            assert_eq!(
                profile.home_department_id, assignment.home_department_id,
                "profile and assignment disagree on the home department"
            );

            let mut expected: Vec<String> = assignment
                .assigned_departments
                .iter()
                .map(|department_id| DepartmentLink::document_id(department_id, user_id))
                .collect();
            expected.sort();
            assert_eq!(
                links, expected,
                "links for {} do not match the assigned departments",
                user_id
            );
        } else {
            if let Some(assignment) = assignment {
                assert!(
                    !assignment.is_active,
                    "{} is {} but still has an active assignment",
                    user_id, profile.role
                );
            }
            assert!(
                links.is_empty(),
                "{} is {} but still holds department links: {:?}",
                user_id,
                profile.role,
                links
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_starts_empty_and_seeds_employees() {
        let ctx = PortalTestContext::new().await;
        assert_eq!(ctx.store.document_count().await, 0);

        let seeded = ctx.seed_employee("u-1").await;
        let read_back = ctx.profile("u-1").await;
        assert_eq!(read_back.role, Role::Employee);
        assert_eq!(read_back.email, seeded.email);
        ctx.assert_records_consistent("u-1").await;
    }
}
