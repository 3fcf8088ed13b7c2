//! roster-service: role-assignment consistency core for the portal.
//!
//! Keeps the denormalized role records (user profile, supervisor assignment,
//! per-department supervisor links) consistent through atomic transition
//! batches, and shields every remote write behind retry-with-backoff plus a
//! durable pending-operation queue for offline periods.

pub mod config;
pub mod models;
pub mod services;
pub mod storage;

pub use config::RosterConfig;
pub use services::{RoleAssignmentEngine, RoleError, RoleQuery, RoleSnapshot};
pub use storage::{MongoStore, PendingQueue, RetryPolicy, SafeStorage};
