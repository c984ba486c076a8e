//! Storage ports for the publish pipeline
//!
//! The orchestrator only talks to these traits. `PgCourseRepository` backs
//! them with PostgreSQL, `MemoryCourseRepository` with an in-process store.

use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a storage adapter
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error("Injected fault while writing {0}")]
    Injected(EntityKind),

    #[error("Unit of work already finished")]
    Finished,
}

impl StoreError {
    /// SQLSTATE of the underlying database error, if any
    pub fn sql_state(&self) -> Option<&SqlState> {
        match self {
            StoreError::Database(e) => e.code(),
            StoreError::Pool(deadpool_postgres::PoolError::Backend(e)) => e.code(),
            _ => None,
        }
    }

    /// The pool gave up waiting for a free connection
    pub fn is_pool_timeout(&self) -> bool {
        matches!(self, StoreError::Pool(deadpool_postgres::PoolError::Timeout(_)))
    }
}

/// Entity kinds written by the clone pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Course,
    Module,
    Lesson,
    Note,
    Test,
    Question,
    Project,
    ProjectStep,
    Lab,
    Certificate,
    Reward,
    AchievementCard,
    MotivationalCard,
}

impl From<CardKind> for EntityKind {
    fn from(kind: CardKind) -> Self {
        match kind {
            CardKind::Achievement => EntityKind::AchievementCard,
            CardKind::Motivational => EntityKind::MotivationalCard,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Course => "course",
            EntityKind::Module => "module",
            EntityKind::Lesson => "lesson",
            EntityKind::Note => "note",
            EntityKind::Test => "test",
            EntityKind::Question => "question",
            EntityKind::Project => "project",
            EntityKind::ProjectStep => "project step",
            EntityKind::Lab => "lab",
            EntityKind::Certificate => "certificate",
            EntityKind::Reward => "reward",
            EntityKind::AchievementCard => "achievement card",
            EntityKind::MotivationalCard => "motivational card",
        };
        f.write_str(name)
    }
}

/// Entry point to the draft and live stores.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Open a transactional unit of work spanning both stores.
    async fn begin(&self) -> StoreResult<Box<dyn PublishUnitOfWork>>;

    /// Plain read of a draft course, outside any unit of work.
    async fn find_draft_course(&self, id: Uuid) -> StoreResult<Option<DraftCourse>>;

    /// A live course with its whole graph, regardless of status.
    async fn live_course_snapshot(&self, id: Uuid) -> StoreResult<Option<LiveCourseSnapshot>>;
}

/// One atomic read/write session over the draft and live stores.
///
/// Nothing written through a unit of work is visible to other sessions until
/// `commit`. Dropping an unfinished unit of work discards its writes.
///
/// Every `draft_*` fetch returns rows in their sequencing order.
#[async_trait]
pub trait PublishUnitOfWork: Send {
    // ── Draft store ────────────────────────────────────────────

    /// Load a draft course and hold it exclusively until the session ends.
    async fn lock_draft_course(&mut self, id: Uuid) -> StoreResult<Option<DraftCourse>>;

    async fn draft_modules(&mut self, course_id: Uuid) -> StoreResult<Vec<ModuleRow>>;

    async fn draft_lessons(&mut self, module_id: Uuid) -> StoreResult<Vec<LessonRow>>;

    async fn draft_notes(&mut self, lesson_id: Uuid) -> StoreResult<Vec<AiNoteRow>>;

    async fn draft_tests(&mut self, course_id: Uuid) -> StoreResult<Vec<TestRow>>;

    async fn draft_questions(&mut self, test_id: Uuid) -> StoreResult<Vec<QuestionRow>>;

    async fn draft_projects(&mut self, course_id: Uuid) -> StoreResult<Vec<ProjectRow>>;

    async fn draft_project_steps(&mut self, project_id: Uuid) -> StoreResult<Vec<ProjectStepRow>>;

    async fn draft_labs(&mut self, course_id: Uuid) -> StoreResult<Vec<LabRow>>;

    async fn draft_certificates(&mut self, course_id: Uuid) -> StoreResult<Vec<CertificateRow>>;

    async fn draft_rewards(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseRewardRow>>;

    async fn draft_cards(&mut self, course_id: Uuid, kind: CardKind) -> StoreResult<Vec<CardRow>>;

    async fn mark_draft_published(
        &mut self,
        id: Uuid,
        live_course_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn set_draft_status(
        &mut self,
        id: Uuid,
        status: CourseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    // ── Live store ─────────────────────────────────────────────

    /// Unlocked read of a live course.
    async fn live_course(&mut self, id: Uuid) -> StoreResult<Option<LiveCourse>>;

    /// Load a live course and hold it exclusively until the session ends.
    async fn lock_live_course(&mut self, id: Uuid) -> StoreResult<Option<LiveCourse>>;

    async fn create_live_course(&mut self, course: &LiveCourse) -> StoreResult<()>;

    async fn update_live_course(&mut self, course: &LiveCourse) -> StoreResult<()>;

    async fn set_live_course_status(
        &mut self,
        id: Uuid,
        status: CourseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Delete every child of a live course. Lessons, notes, questions and
    /// steps go with their parents.
    async fn clear_live_children(&mut self, live_course_id: Uuid) -> StoreResult<()>;

    async fn insert_live_module(&mut self, row: &ModuleRow) -> StoreResult<()>;

    async fn insert_live_lesson(&mut self, row: &LessonRow) -> StoreResult<()>;

    async fn insert_live_note(&mut self, row: &AiNoteRow) -> StoreResult<()>;

    async fn insert_live_test(&mut self, row: &TestRow) -> StoreResult<()>;

    async fn insert_live_question(&mut self, row: &QuestionRow) -> StoreResult<()>;

    async fn insert_live_project(&mut self, row: &ProjectRow) -> StoreResult<()>;

    async fn insert_live_project_step(&mut self, row: &ProjectStepRow) -> StoreResult<()>;

    async fn insert_live_lab(&mut self, row: &LabRow) -> StoreResult<()>;

    async fn insert_live_certificate(&mut self, row: &CertificateRow) -> StoreResult<()>;

    async fn insert_live_reward(&mut self, row: &CourseRewardRow) -> StoreResult<()>;

    async fn insert_live_card(&mut self, kind: CardKind, row: &CardRow) -> StoreResult<()>;

    // ── Session ────────────────────────────────────────────────

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;

    /// End the session without waiting on the store. Used when a statement
    /// may still be running; uncommitted writes are discarded.
    fn abandon(self: Box<Self>);
}
