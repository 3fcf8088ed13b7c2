//! Common helpers for role workflow tests.

use workflow_tests::PortalTestContext;

/// Create a fresh context over the in-memory store and queue.
pub async fn setup() -> PortalTestContext {
    PortalTestContext::new().await
}
