//! In-process course repository
//!
//! Backs the test suite and `STORAGE_BACKEND=memory` smoke runs. A unit of
//! work holds the store lock for its whole lifetime and writes to a private
//! copy of the tables, which replaces the shared tables only on commit.
//! Sessions are therefore fully serialized and all-or-nothing.

use super::repository::{
    CourseRepository, EntityKind, PublishUnitOfWork, StoreError, StoreResult,
};
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
    draft_courses: HashMap<Uuid, DraftCourse>,
    live_courses: HashMap<Uuid, LiveCourse>,
    draft: CourseGraph,
    live: CourseGraph,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum FaultKind {
    Fail,
    Stall(Duration),
}

/// Disturb the write of the `after + 1`-th row of `entity` in the next session
#[derive(Debug, Clone, Copy)]
#[cfg_attr(not(test), allow(dead_code))]
pub struct InjectedFault {
    pub entity: EntityKind,
    pub after: usize,
    pub kind: FaultKind,
}

#[cfg(test)]
impl InjectedFault {
    pub fn fail(entity: EntityKind, after: usize) -> Self {
        Self {
            entity,
            after,
            kind: FaultKind::Fail,
        }
    }

    pub fn stall(entity: EntityKind, after: usize, delay: Duration) -> Self {
        Self {
            entity,
            after,
            kind: FaultKind::Stall(delay),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryCourseRepository {
    tables: Arc<Mutex<Tables>>,
    fault: Arc<Mutex<Option<InjectedFault>>>,
}

impl MemoryCourseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

// No draft editor runs in this process, so seeding and inspection are
// test-only. A server started on the memory backend begins empty.
#[cfg(test)]
impl MemoryCourseRepository {
    /// Store a draft course and its children, as the draft editor would
    pub async fn seed_draft(&self, course: DraftCourse, graph: CourseGraph) {
        let mut tables = self.tables.lock().await;
        tables.draft_courses.insert(course.id, course);
        let draft = &mut tables.draft;
        draft.modules.extend(graph.modules);
        draft.lessons.extend(graph.lessons);
        draft.notes.extend(graph.notes);
        draft.tests.extend(graph.tests);
        draft.questions.extend(graph.questions);
        draft.projects.extend(graph.projects);
        draft.steps.extend(graph.steps);
        draft.labs.extend(graph.labs);
        draft.certificates.extend(graph.certificates);
        draft.rewards.extend(graph.rewards);
        draft.achievement_cards.extend(graph.achievement_cards);
        draft.motivational_cards.extend(graph.motivational_cards);
    }

    /// Change a draft course outside of publishing (draft editor collaborator)
    pub async fn update_draft(&self, course: DraftCourse) {
        let mut tables = self.tables.lock().await;
        tables.draft_courses.insert(course.id, course);
    }

    /// Drop a live course row directly, leaving the draft link dangling
    pub async fn remove_live_course(&self, id: Uuid) {
        let mut tables = self.tables.lock().await;
        tables.live_courses.remove(&id);
        clear_children(&mut tables.live, id);
    }

    pub async fn inject_fault(&self, fault: InjectedFault) {
        *self.fault.lock().await = Some(fault);
    }

    pub async fn live_courses(&self) -> Vec<LiveCourse> {
        let tables = self.tables.lock().await;
        let mut courses: Vec<LiveCourse> = tables.live_courses.values().cloned().collect();
        courses.sort_by_key(|c| (c.created_at, c.id));
        courses
    }

    /// All live child rows, regardless of course
    pub async fn live_graph(&self) -> CourseGraph {
        self.tables.lock().await.live.clone()
    }
}

#[async_trait]
impl CourseRepository for MemoryCourseRepository {
    async fn begin(&self) -> StoreResult<Box<dyn PublishUnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        let fault = self.fault.lock().await.take();
        debug!("Opened in-memory unit of work");
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            work,
            fault,
            written: HashMap::new(),
        }))
    }

    async fn find_draft_course(&self, id: Uuid) -> StoreResult<Option<DraftCourse>> {
        Ok(self.tables.lock().await.draft_courses.get(&id).cloned())
    }

    async fn live_course_snapshot(&self, id: Uuid) -> StoreResult<Option<LiveCourseSnapshot>> {
        let tables = self.tables.lock().await;
        Ok(tables.live_courses.get(&id).map(|course| LiveCourseSnapshot {
            course: course.clone(),
            graph: course_subgraph(&tables.live, id),
        }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    fault: Option<InjectedFault>,
    written: HashMap<EntityKind, usize>,
}

impl MemoryUnitOfWork {
    /// Count a write and trip the injected fault when its turn comes
    async fn record_write(&mut self, entity: EntityKind) -> StoreResult<()> {
        let count = self.written.entry(entity).or_insert(0);
        if let Some(fault) = self.fault {
            if fault.entity == entity && *count == fault.after {
                match fault.kind {
                    FaultKind::Fail => return Err(StoreError::Injected(entity)),
                    FaultKind::Stall(delay) => tokio::time::sleep(delay).await,
                }
            }
        }
        *count += 1;
        Ok(())
    }
}

fn sorted<T: Clone, K: Ord>(rows: impl Iterator<Item = T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|row| key(row));
    rows
}

/// Remove every live child of a course, cascading like the SQL schema
fn clear_children(graph: &mut CourseGraph, course_id: Uuid) {
    let modules: HashSet<Uuid> = graph
        .modules
        .iter()
        .filter(|m| m.course_id == course_id)
        .map(|m| m.id)
        .collect();
    let lessons: HashSet<Uuid> = graph
        .lessons
        .iter()
        .filter(|l| modules.contains(&l.module_id))
        .map(|l| l.id)
        .collect();
    let tests: HashSet<Uuid> = graph
        .tests
        .iter()
        .filter(|t| t.course_id == course_id)
        .map(|t| t.id)
        .collect();
    let projects: HashSet<Uuid> = graph
        .projects
        .iter()
        .filter(|p| p.course_id == course_id)
        .map(|p| p.id)
        .collect();

    graph.modules.retain(|m| m.course_id != course_id);
    graph.lessons.retain(|l| !lessons.contains(&l.id));
    graph.notes.retain(|n| !lessons.contains(&n.lesson_id));
    graph.tests.retain(|t| t.course_id != course_id);
    graph.questions.retain(|q| !tests.contains(&q.test_id));
    graph.projects.retain(|p| p.course_id != course_id);
    graph.steps.retain(|s| !projects.contains(&s.project_id));
    graph.labs.retain(|l| l.course_id != course_id);
    graph.certificates.retain(|c| c.course_id != course_id);
    graph.rewards.retain(|r| r.course_id != course_id);
    graph.achievement_cards.retain(|c| c.course_id != course_id);
    graph.motivational_cards.retain(|c| c.course_id != course_id);
}

/// The slice of a graph that belongs to one course
fn course_subgraph(graph: &CourseGraph, course_id: Uuid) -> CourseGraph {
    let modules = sorted(
        graph.modules.iter().filter(|m| m.course_id == course_id).cloned(),
        |m| (m.order_index, m.created_at, m.id),
    );
    let module_ids: HashSet<Uuid> = modules.iter().map(|m| m.id).collect();
    let lessons = sorted(
        graph.lessons.iter().filter(|l| module_ids.contains(&l.module_id)).cloned(),
        |l| (l.module_id, l.order_index, l.created_at, l.id),
    );
    let lesson_ids: HashSet<Uuid> = lessons.iter().map(|l| l.id).collect();
    let tests = sorted(
        graph.tests.iter().filter(|t| t.course_id == course_id).cloned(),
        |t| (t.created_at, t.id),
    );
    let test_ids: HashSet<Uuid> = tests.iter().map(|t| t.id).collect();
    let projects = sorted(
        graph.projects.iter().filter(|p| p.course_id == course_id).cloned(),
        |p| (p.created_at, p.id),
    );
    let project_ids: HashSet<Uuid> = projects.iter().map(|p| p.id).collect();

    CourseGraph {
        notes: sorted(
            graph.notes.iter().filter(|n| lesson_ids.contains(&n.lesson_id)).cloned(),
            |n| (n.lesson_id, n.version, n.created_at, n.id),
        ),
        questions: sorted(
            graph.questions.iter().filter(|q| test_ids.contains(&q.test_id)).cloned(),
            |q| (q.test_id, q.order_index, q.created_at, q.id),
        ),
        steps: sorted(
            graph.steps.iter().filter(|s| project_ids.contains(&s.project_id)).cloned(),
            |s| (s.project_id, s.step_number, s.created_at, s.id),
        ),
        labs: sorted(
            graph.labs.iter().filter(|l| l.course_id == course_id).cloned(),
            |l| (l.created_at, l.id),
        ),
        certificates: sorted(
            graph.certificates.iter().filter(|c| c.course_id == course_id).cloned(),
            |c| (c.created_at, c.id),
        ),
        rewards: sorted(
            graph.rewards.iter().filter(|r| r.course_id == course_id).cloned(),
            |r| (r.created_at, r.id),
        ),
        achievement_cards: sorted(
            graph.achievement_cards.iter().filter(|c| c.course_id == course_id).cloned(),
            |c| (c.sort_order, c.created_at, c.id),
        ),
        motivational_cards: sorted(
            graph.motivational_cards.iter().filter(|c| c.course_id == course_id).cloned(),
            |c| (c.sort_order, c.created_at, c.id),
        ),
        modules,
        lessons,
        tests,
        projects,
    }
}

#[async_trait]
impl PublishUnitOfWork for MemoryUnitOfWork {
    async fn lock_draft_course(&mut self, id: Uuid) -> StoreResult<Option<DraftCourse>> {
        Ok(self.work.draft_courses.get(&id).cloned())
    }

    async fn draft_modules(&mut self, course_id: Uuid) -> StoreResult<Vec<ModuleRow>> {
        Ok(sorted(
            self.work.draft.modules.iter().filter(|m| m.course_id == course_id).cloned(),
            |m| (m.order_index, m.created_at, m.id),
        ))
    }

    async fn draft_lessons(&mut self, module_id: Uuid) -> StoreResult<Vec<LessonRow>> {
        Ok(sorted(
            self.work.draft.lessons.iter().filter(|l| l.module_id == module_id).cloned(),
            |l| (l.order_index, l.created_at, l.id),
        ))
    }

    async fn draft_notes(&mut self, lesson_id: Uuid) -> StoreResult<Vec<AiNoteRow>> {
        Ok(sorted(
            self.work.draft.notes.iter().filter(|n| n.lesson_id == lesson_id).cloned(),
            |n| (n.version, n.created_at, n.id),
        ))
    }

    async fn draft_tests(&mut self, course_id: Uuid) -> StoreResult<Vec<TestRow>> {
        Ok(sorted(
            self.work.draft.tests.iter().filter(|t| t.course_id == course_id).cloned(),
            |t| (t.created_at, t.id),
        ))
    }

    async fn draft_questions(&mut self, test_id: Uuid) -> StoreResult<Vec<QuestionRow>> {
        Ok(sorted(
            self.work.draft.questions.iter().filter(|q| q.test_id == test_id).cloned(),
            |q| (q.order_index, q.created_at, q.id),
        ))
    }

    async fn draft_projects(&mut self, course_id: Uuid) -> StoreResult<Vec<ProjectRow>> {
        Ok(sorted(
            self.work.draft.projects.iter().filter(|p| p.course_id == course_id).cloned(),
            |p| (p.created_at, p.id),
        ))
    }

    async fn draft_project_steps(&mut self, project_id: Uuid) -> StoreResult<Vec<ProjectStepRow>> {
        Ok(sorted(
            self.work.draft.steps.iter().filter(|s| s.project_id == project_id).cloned(),
            |s| (s.step_number, s.created_at, s.id),
        ))
    }

    async fn draft_labs(&mut self, course_id: Uuid) -> StoreResult<Vec<LabRow>> {
        Ok(sorted(
            self.work.draft.labs.iter().filter(|l| l.course_id == course_id).cloned(),
            |l| (l.created_at, l.id),
        ))
    }

    async fn draft_certificates(&mut self, course_id: Uuid) -> StoreResult<Vec<CertificateRow>> {
        Ok(sorted(
            self.work.draft.certificates.iter().filter(|c| c.course_id == course_id).cloned(),
            |c| (c.created_at, c.id),
        ))
    }

    async fn draft_rewards(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseRewardRow>> {
        Ok(sorted(
            self.work.draft.rewards.iter().filter(|r| r.course_id == course_id).cloned(),
            |r| (r.created_at, r.id),
        ))
    }

    async fn draft_cards(&mut self, course_id: Uuid, kind: CardKind) -> StoreResult<Vec<CardRow>> {
        Ok(sorted(
            self.work.draft.cards(kind).iter().filter(|c| c.course_id == course_id).cloned(),
            |c| (c.sort_order, c.created_at, c.id),
        ))
    }

    async fn mark_draft_published(
        &mut self,
        id: Uuid,
        live_course_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(course) = self.work.draft_courses.get_mut(&id) {
            course.live_course_id = Some(live_course_id);
            course.status = CourseStatus::Published;
            course.published_at = Some(at);
            course.updated_at = at;
        }
        Ok(())
    }

    async fn set_draft_status(
        &mut self,
        id: Uuid,
        status: CourseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(course) = self.work.draft_courses.get_mut(&id) {
            course.status = status;
            course.updated_at = at;
        }
        Ok(())
    }

    async fn live_course(&mut self, id: Uuid) -> StoreResult<Option<LiveCourse>> {
        Ok(self.work.live_courses.get(&id).cloned())
    }

    async fn lock_live_course(&mut self, id: Uuid) -> StoreResult<Option<LiveCourse>> {
        Ok(self.work.live_courses.get(&id).cloned())
    }

    async fn create_live_course(&mut self, course: &LiveCourse) -> StoreResult<()> {
        self.record_write(EntityKind::Course).await?;
        self.work.live_courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn update_live_course(&mut self, course: &LiveCourse) -> StoreResult<()> {
        self.record_write(EntityKind::Course).await?;
        self.work.live_courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn set_live_course_status(
        &mut self,
        id: Uuid,
        status: CourseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(course) = self.work.live_courses.get_mut(&id) {
            course.status = status;
            course.updated_at = at;
        }
        Ok(())
    }

    async fn clear_live_children(&mut self, live_course_id: Uuid) -> StoreResult<()> {
        clear_children(&mut self.work.live, live_course_id);
        Ok(())
    }

    async fn insert_live_module(&mut self, row: &ModuleRow) -> StoreResult<()> {
        self.record_write(EntityKind::Module).await?;
        self.work.live.modules.push(row.clone());
        Ok(())
    }

    async fn insert_live_lesson(&mut self, row: &LessonRow) -> StoreResult<()> {
        self.record_write(EntityKind::Lesson).await?;
        self.work.live.lessons.push(row.clone());
        Ok(())
    }

    async fn insert_live_note(&mut self, row: &AiNoteRow) -> StoreResult<()> {
        self.record_write(EntityKind::Note).await?;
        self.work.live.notes.push(row.clone());
        Ok(())
    }

    async fn insert_live_test(&mut self, row: &TestRow) -> StoreResult<()> {
        self.record_write(EntityKind::Test).await?;
        self.work.live.tests.push(row.clone());
        Ok(())
    }

    async fn insert_live_question(&mut self, row: &QuestionRow) -> StoreResult<()> {
        self.record_write(EntityKind::Question).await?;
        self.work.live.questions.push(row.clone());
        Ok(())
    }

    async fn insert_live_project(&mut self, row: &ProjectRow) -> StoreResult<()> {
        self.record_write(EntityKind::Project).await?;
        self.work.live.projects.push(row.clone());
        Ok(())
    }

    async fn insert_live_project_step(&mut self, row: &ProjectStepRow) -> StoreResult<()> {
        self.record_write(EntityKind::ProjectStep).await?;
        self.work.live.steps.push(row.clone());
        Ok(())
    }

    async fn insert_live_lab(&mut self, row: &LabRow) -> StoreResult<()> {
        self.record_write(EntityKind::Lab).await?;
        self.work.live.labs.push(row.clone());
        Ok(())
    }

    async fn insert_live_certificate(&mut self, row: &CertificateRow) -> StoreResult<()> {
        self.record_write(EntityKind::Certificate).await?;
        self.work.live.certificates.push(row.clone());
        Ok(())
    }

    async fn insert_live_reward(&mut self, row: &CourseRewardRow) -> StoreResult<()> {
        self.record_write(EntityKind::Reward).await?;
        self.work.live.rewards.push(row.clone());
        Ok(())
    }

    async fn insert_live_card(&mut self, kind: CardKind, row: &CardRow) -> StoreResult<()> {
        self.record_write(kind.into()).await?;
        self.work.live.cards_mut(kind).push(row.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnitOfWork { mut guard, work, .. } = *self;
        *guard = work;
        debug!("Committed in-memory unit of work");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        debug!("Rolled back in-memory unit of work");
        Ok(())
    }

    fn abandon(self: Box<Self>) {
        debug!("Abandoned in-memory unit of work");
    }
}
