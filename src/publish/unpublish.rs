//! Unpublish orchestrator
//!
//! Unpublishing only flips status flags. Live rows stay in place so the
//! course can be audited, and the draft/live link survives so the next
//! publish refreshes the same live course.

use super::orchestrator::PublishOrchestrator;
use super::types::{PublishError, UnpublishOutcome};
use crate::db::repository::{CourseRepository, PublishUnitOfWork};
use crate::models::CourseStatus;
use chrono::Utc;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};
use uuid::Uuid;

impl PublishOrchestrator {
    /// Take a live course out of circulation and reopen its draft
    pub async fn unpublish(&self, live_course_id: Uuid) -> Result<UnpublishOutcome, PublishError> {
        self.unpublish_until(live_course_id, Instant::now() + self.timeout())
            .await
    }

    async fn unpublish_until(
        &self,
        live_course_id: Uuid,
        deadline: Instant,
    ) -> Result<UnpublishOutcome, PublishError> {
        info!("Unpublishing live course {}", live_course_id);

        let mut uow = self.open(deadline, "unpublish", live_course_id).await?;
        let result = timeout_at(deadline, unpublish_in(uow.as_mut(), live_course_id)).await;
        let outcome = self.settle(uow, result, "unpublish", live_course_id).await?;

        info!(
            "Unpublished live course {} (draft reopened: {})",
            live_course_id,
            outcome
                .draft_course_id
                .map_or_else(|| "none".to_string(), |id| id.to_string())
        );
        Ok(outcome)
    }

    /// Unpublish through the draft course that owns the live link
    pub async fn unpublish_draft(&self, draft_course_id: Uuid) -> Result<UnpublishOutcome, PublishError> {
        let deadline = Instant::now() + self.timeout();
        let found = timeout_at(deadline, self.repository().find_draft_course(draft_course_id))
            .await
            .map_err(|_| self.timed_out("unpublish", draft_course_id, "looking up the draft"))?;
        let draft = found?
            .ok_or_else(|| PublishError::NotFound(format!("Draft course {} not found", draft_course_id)))?;

        let live_course_id = draft.live_course_id.ok_or_else(|| {
            PublishError::NotFound(format!(
                "Draft course {} has no live course",
                draft_course_id
            ))
        })?;

        self.unpublish_until(live_course_id, deadline).await
    }
}

async fn unpublish_in(
    uow: &mut dyn PublishUnitOfWork,
    live_course_id: Uuid,
) -> Result<UnpublishOutcome, PublishError> {
    // Lock order matches publish (draft, then live) so the two never deadlock.
    let peek = uow
        .live_course(live_course_id)
        .await?
        .ok_or_else(|| PublishError::NotFound(format!("Live course {} not found", live_course_id)))?;

    let draft = match peek.draft_course_id {
        Some(draft_id) => uow.lock_draft_course(draft_id).await?,
        None => None,
    };

    let live = uow
        .lock_live_course(live_course_id)
        .await?
        .ok_or_else(|| PublishError::NotFound(format!("Live course {} not found", live_course_id)))?;

    if live.status != CourseStatus::Published {
        return Err(PublishError::InvalidState(format!(
            "live course is not published (status: {})",
            live.status
        )));
    }

    let now = Utc::now();
    uow.set_live_course_status(live.id, CourseStatus::Unpublished, now)
        .await?;

    let reopened = match (live.draft_course_id, draft) {
        (Some(_), Some(draft)) => {
            uow.set_draft_status(draft.id, CourseStatus::Draft, now).await?;
            Some(draft.id)
        }
        (Some(missing), None) => {
            warn!(
                "Live course {} points at missing draft course {}; nothing to reopen",
                live.id, missing
            );
            None
        }
        (None, _) => None,
    };

    Ok(UnpublishOutcome {
        live_course_id: live.id,
        draft_course_id: reopened,
    })
}
