//! Course publishing route handlers
//!
//! Thin callers of the publish orchestrator. Each committed publish or
//! unpublish is appended to the audit log here.

use crate::audit::{AuditAction, AuditEntry, ANONYMOUS_ACTOR};
use crate::db::CourseRepository;
use crate::error::{not_found_error, ApiResult};
use crate::models::{CourseStatus, LiveCourseSnapshot, SuccessResponse};
use crate::publish::{PublishOutcome, UnpublishOutcome};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

/// Header naming the user on whose behalf the call is made
pub const ACTOR_HEADER: &str = "x-actor-id";

fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_ACTOR)
        .to_string()
}

/// Publish a draft course into the live catalog
pub async fn publish_course(
    State(state): State<SharedState>,
    Path(draft_course_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse<PublishOutcome>>> {
    let actor = actor_from(&headers);
    debug!("Publish of draft course {} requested by {}", draft_course_id, actor);

    let outcome = state.publisher.publish(draft_course_id).await?;

    state
        .audit
        .record(AuditEntry::new(
            actor,
            AuditAction::CoursePublished,
            "draft_course",
            draft_course_id,
            Some(json!({
                "liveCourseId": outcome.live_course_id,
                "version": outcome.version,
                "created": outcome.created,
            })),
        ))
        .await;

    Ok(Json(SuccessResponse::with_data(
        format!("Course published (version {})", outcome.version),
        outcome,
    )))
}

/// Take a draft course's live counterpart out of circulation
pub async fn unpublish_course(
    State(state): State<SharedState>,
    Path(draft_course_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse<UnpublishOutcome>>> {
    let actor = actor_from(&headers);
    debug!("Unpublish of draft course {} requested by {}", draft_course_id, actor);

    let outcome = state.publisher.unpublish_draft(draft_course_id).await?;

    state
        .audit
        .record(AuditEntry::new(
            actor,
            AuditAction::CourseUnpublished,
            "draft_course",
            draft_course_id,
            Some(json!({ "liveCourseId": outcome.live_course_id })),
        ))
        .await;

    Ok(Json(SuccessResponse::with_data("Course unpublished", outcome)))
}

/// Public read of a live course; anything not published is invisible
pub async fn get_live_course(
    State(state): State<SharedState>,
    Path(live_course_id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<LiveCourseSnapshot>>> {
    let snapshot = state
        .repo
        .live_course_snapshot(live_course_id)
        .await?
        .filter(|s| s.course.status == CourseStatus::Published)
        .ok_or_else(|| not_found_error(format!("Live course {} not found", live_course_id)))?;

    info!(
        "Served live course {} v{} ({} modules)",
        snapshot.course.id,
        snapshot.course.version,
        snapshot.graph.modules.len()
    );

    Ok(Json(SuccessResponse::with_data(
        snapshot.course.details.name.clone(),
        snapshot,
    )))
}

// =============================================================================
// AUDIT LOG ROUTES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub resource_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

pub async fn get_audit_log(
    State(state): State<SharedState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<SuccessResponse<AuditLogResponse>>> {
    let entries = state.audit.list(query.resource_id, query.limit).await;

    Ok(Json(SuccessResponse::with_data(
        format!("Retrieved {} audit entries", entries.len()),
        AuditLogResponse { entries },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_defaults_to_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor_from(&headers), "anonymous");

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  "));
        assert_eq!(actor_from(&headers), "anonymous");

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("editor-42"));
        assert_eq!(actor_from(&headers), "editor-42");
    }
}
