//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::audit::AuditLog;
use crate::db::CourseRepository;
use crate::publish::PublishOrchestrator;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
pub struct AppState {
    /// Draft/live course storage (PostgreSQL or in-memory)
    pub repo: Arc<dyn CourseRepository>,

    /// Publish and unpublish orchestration over `repo`
    pub publisher: PublishOrchestrator,

    /// Record of committed publish/unpublish actions
    pub audit: AuditLog,
}

impl AppState {
    pub fn new(repo: Arc<dyn CourseRepository>, publish_timeout: Duration) -> Self {
        Self {
            publisher: PublishOrchestrator::new(repo.clone(), publish_timeout),
            repo,
            audit: AuditLog::new(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
