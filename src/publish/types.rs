//! Result and error types for the publish pipeline

use crate::db::repository::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

/// Why a publish or unpublish did not happen.
///
/// Everything except `Internal`, `Conflict` and `Timeout` is detected before
/// the first write. In every case the stores are left exactly as they were.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

impl PublishError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            PublishError::NotFound(_) => "NOT_FOUND",
            PublishError::InvalidState(_) => "INVALID_STATE",
            PublishError::Validation(_) => "VALIDATION_ERROR",
            PublishError::Conflict(_) => "CONFLICT",
            PublishError::Timeout(_) => "TIMEOUT",
            PublishError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for PublishError {
    fn from(err: StoreError) -> Self {
        if err.is_pool_timeout() {
            return PublishError::Timeout(format!("No database session available: {}", err));
        }
        match err.sql_state() {
            Some(state)
                if *state == SqlState::T_R_SERIALIZATION_FAILURE
                    || *state == SqlState::T_R_DEADLOCK_DETECTED
                    || *state == SqlState::UNIQUE_VIOLATION
                    || *state == SqlState::LOCK_NOT_AVAILABLE =>
            {
                PublishError::Conflict(format!("Concurrent publish detected: {}", err))
            }
            Some(state) if *state == SqlState::QUERY_CANCELED => {
                PublishError::Timeout(format!("Statement timed out: {}", err))
            }
            _ => PublishError::Internal(err.to_string()),
        }
    }
}

/// Rows written per entity kind during one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneCounts {
    pub modules: usize,
    pub lessons: usize,
    pub notes: usize,
    pub tests: usize,
    pub questions: usize,
    pub projects: usize,
    pub steps: usize,
    pub labs: usize,
    pub certificates: usize,
    pub rewards: usize,
    pub achievement_cards: usize,
    pub motivational_cards: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub live_course_id: Uuid,
    pub version: i32,
    /// True on first publication, false when an existing live course was refreshed
    pub created: bool,
    pub counts: CloneCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpublishOutcome {
    pub live_course_id: Uuid,
    /// Draft course reopened for editing, if the link still resolved
    pub draft_course_id: Option<Uuid>,
}
