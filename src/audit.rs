//! Audit log
//!
//! Publish and unpublish are recorded here by the route layer once they have
//! committed. The orchestrator itself never writes audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Actor recorded when the caller does not identify itself
pub const ANONYMOUS_ACTOR: &str = "anonymous";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CoursePublished,
    CourseUnpublished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub details: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        resource_type: &str,
        resource_id: Uuid,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.into(),
            action,
            resource_type: resource_type.to_string(),
            resource_id,
            details,
        }
    }
}

/// Append-only, in-memory audit trail
#[derive(Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, entry: AuditEntry) {
        debug!(
            "Audit: {:?} {} {} by {}",
            entry.action, entry.resource_type, entry.resource_id, entry.actor
        );
        self.entries.write().await.push(entry);
    }

    /// Most recent first, optionally narrowed to one resource
    pub async fn list(&self, resource_id: Option<Uuid>, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;

        entries
            .iter()
            .rev()
            .filter(|e| resource_id.map(|id| e.resource_id == id).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }
}
