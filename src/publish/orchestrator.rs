//! Publish orchestrator
//!
//! Turns a draft course graph into its live counterpart inside one unit of
//! work: validate, resolve the live course (reuse or create), clone every
//! entity kind parent-before-child, then link the draft to the live course.
//! Any failure or timeout rolls the whole operation back.

use super::cloner::{GraphCloner, ModulePlan};
use super::remap::IdRemap;
use super::types::{PublishError, PublishOutcome};
use crate::db::repository::{CourseRepository, PublishUnitOfWork};
use crate::models::{CourseStatus, LiveCourse};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct PublishOrchestrator {
    repo: Arc<dyn CourseRepository>,
    timeout: Duration,
}

impl PublishOrchestrator {
    pub fn new(repo: Arc<dyn CourseRepository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    pub fn repository(&self) -> &Arc<dyn CourseRepository> {
        &self.repo
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Publish a draft course, returning the (stable) live course id
    pub async fn publish(&self, draft_course_id: Uuid) -> Result<PublishOutcome, PublishError> {
        info!("Publishing draft course {}", draft_course_id);
        let started = Instant::now();
        let deadline = started + self.timeout;

        let mut uow = self.open(deadline, "publish", draft_course_id).await?;
        let result = timeout_at(deadline, publish_in(uow.as_mut(), draft_course_id)).await;
        let outcome = self.settle(uow, result, "publish", draft_course_id).await?;

        info!(
            "Published draft course {} as live course {} v{} ({} path, {} modules, {} lessons) in {}ms",
            draft_course_id,
            outcome.live_course_id,
            outcome.version,
            if outcome.created { "create" } else { "update-in-place" },
            outcome.counts.modules,
            outcome.counts.lessons,
            started.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Open a unit of work, waiting for a session no later than `deadline`
    pub(super) async fn open(
        &self,
        deadline: Instant,
        operation: &str,
        subject: Uuid,
    ) -> Result<Box<dyn PublishUnitOfWork>, PublishError> {
        match timeout_at(deadline, self.repo.begin()).await {
            Ok(uow) => Ok(uow?),
            Err(_) => {
                let err = self.timed_out(operation, subject, "waiting for a session");
                error!("{}", err);
                Err(err)
            }
        }
    }

    pub(super) fn timed_out(&self, operation: &str, subject: Uuid, detail: &str) -> PublishError {
        PublishError::Timeout(format!(
            "{} of {} exceeded {:?} {}",
            operation, subject, self.timeout, detail
        ))
    }

    /// Commit on success, roll back on error, abandon on timeout
    pub(super) async fn settle<T>(
        &self,
        uow: Box<dyn PublishUnitOfWork>,
        result: Result<Result<T, PublishError>, tokio::time::error::Elapsed>,
        operation: &str,
        subject: Uuid,
    ) -> Result<T, PublishError> {
        let err = match result {
            Ok(Ok(value)) => {
                uow.commit().await?;
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(_) => {
                let err = self.timed_out(operation, subject, "and was rolled back");
                error!("{}; discarding its session", err);
                uow.abandon();
                return Err(err);
            }
        };

        match &err {
            PublishError::Internal(_) | PublishError::Conflict(_) | PublishError::Timeout(_) => {
                error!("{} of {} failed, rolling back: {}", operation, subject, err)
            }
            _ => warn!("{} of {} rejected: {}", operation, subject, err),
        }
        if let Err(rollback_err) = uow.rollback().await {
            error!("Rollback after failed {} of {} also failed: {}", operation, subject, rollback_err);
        }
        Err(err)
    }
}

/// The publish algorithm against an open unit of work
async fn publish_in(
    uow: &mut dyn PublishUnitOfWork,
    draft_course_id: Uuid,
) -> Result<PublishOutcome, PublishError> {
    // Validation: reads only, first failure wins.
    let draft = uow
        .lock_draft_course(draft_course_id)
        .await?
        .ok_or_else(|| PublishError::NotFound(format!("Draft course {} not found", draft_course_id)))?;

    if draft.status == CourseStatus::Generating {
        return Err(PublishError::InvalidState(
            "cannot publish while generating".to_string(),
        ));
    }

    let modules = uow.draft_modules(draft.id).await?;
    if modules.is_empty() {
        return Err(PublishError::Validation(
            "at least one module required".to_string(),
        ));
    }

    let mut plan: Vec<ModulePlan> = Vec::with_capacity(modules.len());
    for module in modules {
        let lessons = uow.draft_lessons(module.id).await?;
        plan.push((module, lessons));
    }
    if plan.iter().all(|(_, lessons)| lessons.is_empty()) {
        return Err(PublishError::Validation(
            "at least one lesson required".to_string(),
        ));
    }

    // Resolve the live course: refresh in place or mint once.
    let now = Utc::now();
    let existing = match draft.live_course_id {
        Some(live_id) => uow.lock_live_course(live_id).await?,
        None => None,
    };
    let (live, created) = match existing {
        Some(mut live) => {
            uow.clear_live_children(live.id).await?;
            live.refresh_from(&draft, now);
            uow.update_live_course(&live).await?;
            (live, false)
        }
        None => {
            if let Some(stale) = draft.live_course_id {
                warn!(
                    "Draft course {} points at missing live course {}; creating a new one",
                    draft.id, stale
                );
            }
            let live = LiveCourse::from_draft(&draft, now);
            uow.create_live_course(&live).await?;
            (live, true)
        }
    };

    // Clone pass, parents before children.
    let mut remap = IdRemap::new();
    let counts = {
        let mut cloner = GraphCloner::new(&mut *uow, draft.id, live.id);
        cloner.clone_modules(&plan, &mut remap).await?;
        debug!(
            "Remapped {} modules and {} lessons onto live course {}",
            remap.module_count(),
            remap.lesson_count(),
            live.id
        );
        cloner.clone_tests(&remap).await?;
        cloner.clone_projects(&remap).await?;
        cloner.clone_labs(&remap).await?;
        cloner.clone_course_scoped().await?;
        cloner.counts()
    };

    uow.mark_draft_published(draft.id, live.id, now).await?;

    Ok(PublishOutcome {
        live_course_id: live.id,
        version: live.version,
        created,
        counts,
    })
}
