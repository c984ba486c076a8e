//! PostgreSQL adapter for the course stores
//!
//! A unit of work owns one pooled connection and drives an explicit
//! `BEGIN ... COMMIT` block on it. The draft course row is taken with
//! `SELECT ... FOR UPDATE`, which serializes concurrent publishes of the same
//! draft for the whole transaction.

use super::queries::{self, Side};
use super::repository::{CourseRepository, PublishUnitOfWork, StoreError, StoreResult};
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Object, Pool};
use postgres_types::Json;
use std::time::Duration;
use tokio_postgres::Row;
use tracing::{debug, warn};
use uuid::Uuid;

/// Course repository backed by a deadpool-postgres pool
pub struct PgCourseRepository {
    pool: Pool,
    statement_timeout: Duration,
}

impl PgCourseRepository {
    pub fn new(pool: Pool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }
}

#[async_trait]
impl CourseRepository for PgCourseRepository {
    async fn begin(&self) -> StoreResult<Box<dyn PublishUnitOfWork>> {
        // Wrapped before BEGIN so a caller giving up mid-begin discards the
        // connection instead of returning it to the pool inside a transaction.
        let uow = PgUnitOfWork {
            client: Some(self.pool.get().await?),
        };
        let client = uow.client()?;
        client.batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED").await?;
        client
            .batch_execute(&format!(
                "SET LOCAL statement_timeout = {}",
                self.statement_timeout.as_millis()
            ))
            .await?;

        debug!("Opened publish transaction");
        Ok(Box::new(uow))
    }

    async fn find_draft_course(&self, id: Uuid) -> StoreResult<Option<DraftCourse>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(&queries::select_draft_course(), &[&id]).await?;
        row.as_ref().map(draft_course_from_row).transpose()
    }

    async fn live_course_snapshot(&self, id: Uuid) -> StoreResult<Option<LiveCourseSnapshot>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(&queries::select_live_course(false), &[&id]).await?;
        let course = match row.as_ref().map(live_course_from_row).transpose()? {
            Some(course) => course,
            None => return Ok(None),
        };

        let graph = read_graph(&client, Side::Live, id).await?;
        Ok(Some(LiveCourseSnapshot { course, graph }))
    }
}

/// Read every child of a course on one side in a fixed order
async fn read_graph(client: &Object, side: Side, course_id: Uuid) -> StoreResult<CourseGraph> {
    let mut graph = CourseGraph::default();

    graph.modules = map_rows(client.query(&queries::select_modules(side), &[&course_id]).await?, module_from_row);
    let module_ids: Vec<Uuid> = graph.modules.iter().map(|m| m.id).collect();
    graph.lessons = map_rows(client.query(&queries::select_lessons(side), &[&module_ids]).await?, lesson_from_row);
    let lesson_ids: Vec<Uuid> = graph.lessons.iter().map(|l| l.id).collect();
    graph.notes = map_rows(client.query(&queries::select_notes(side), &[&lesson_ids]).await?, note_from_row);

    graph.tests = map_rows(client.query(&queries::select_tests(side), &[&course_id]).await?, test_from_row);
    let test_ids: Vec<Uuid> = graph.tests.iter().map(|t| t.id).collect();
    graph.questions = map_rows(client.query(&queries::select_questions(side), &[&test_ids]).await?, question_from_row);

    graph.projects = map_rows(client.query(&queries::select_projects(side), &[&course_id]).await?, project_from_row);
    let project_ids: Vec<Uuid> = graph.projects.iter().map(|p| p.id).collect();
    graph.steps = map_rows(client.query(&queries::select_steps(side), &[&project_ids]).await?, step_from_row);

    graph.labs = map_rows(client.query(&queries::select_labs(side), &[&course_id]).await?, lab_from_row);
    graph.certificates = map_rows(
        client.query(&queries::select_certificates(side), &[&course_id]).await?,
        certificate_from_row,
    );
    graph.rewards = map_rows(client.query(&queries::select_rewards(side), &[&course_id]).await?, reward_from_row);
    for kind in [CardKind::Achievement, CardKind::Motivational] {
        *graph.cards_mut(kind) = map_rows(
            client.query(&queries::select_cards(side, kind), &[&course_id]).await?,
            card_from_row,
        );
    }

    Ok(graph)
}

/// One open PostgreSQL transaction
pub struct PgUnitOfWork {
    client: Option<Object>,
}

impl PgUnitOfWork {
    fn client(&self) -> StoreResult<&Object> {
        self.client.as_ref().ok_or(StoreError::Finished)
    }

    async fn query_children<T: Send>(
        &self,
        sql: String,
        parent_id: Uuid,
        by_array: bool,
        map: fn(&Row) -> T,
    ) -> StoreResult<Vec<T>> {
        let client = self.client()?;
        let rows = if by_array {
            client.query(&sql, &[&vec![parent_id]]).await?
        } else {
            client.query(&sql, &[&parent_id]).await?
        };
        Ok(map_rows(rows, map))
    }

    async fn finish(&mut self, statement: &str) -> StoreResult<()> {
        let client = self.client.take().ok_or(StoreError::Finished)?;
        match client.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Connection state is unknown; keep it out of the pool.
                drop(Object::take(client));
                Err(e.into())
            }
        }
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("Publish transaction dropped while open; discarding its connection");
            drop(Object::take(client));
        }
    }
}

#[async_trait]
impl PublishUnitOfWork for PgUnitOfWork {
    async fn lock_draft_course(&mut self, id: Uuid) -> StoreResult<Option<DraftCourse>> {
        let row = self.client()?.query_opt(&queries::lock_draft_course(), &[&id]).await?;
        row.as_ref().map(draft_course_from_row).transpose()
    }

    async fn draft_modules(&mut self, course_id: Uuid) -> StoreResult<Vec<ModuleRow>> {
        self.query_children(queries::select_modules(Side::Draft), course_id, false, module_from_row)
            .await
    }

    async fn draft_lessons(&mut self, module_id: Uuid) -> StoreResult<Vec<LessonRow>> {
        self.query_children(queries::select_lessons(Side::Draft), module_id, true, lesson_from_row)
            .await
    }

    async fn draft_notes(&mut self, lesson_id: Uuid) -> StoreResult<Vec<AiNoteRow>> {
        self.query_children(queries::select_notes(Side::Draft), lesson_id, true, note_from_row)
            .await
    }

    async fn draft_tests(&mut self, course_id: Uuid) -> StoreResult<Vec<TestRow>> {
        self.query_children(queries::select_tests(Side::Draft), course_id, false, test_from_row)
            .await
    }

    async fn draft_questions(&mut self, test_id: Uuid) -> StoreResult<Vec<QuestionRow>> {
        self.query_children(queries::select_questions(Side::Draft), test_id, true, question_from_row)
            .await
    }

    async fn draft_projects(&mut self, course_id: Uuid) -> StoreResult<Vec<ProjectRow>> {
        self.query_children(queries::select_projects(Side::Draft), course_id, false, project_from_row)
            .await
    }

    async fn draft_project_steps(&mut self, project_id: Uuid) -> StoreResult<Vec<ProjectStepRow>> {
        self.query_children(queries::select_steps(Side::Draft), project_id, true, step_from_row)
            .await
    }

    async fn draft_labs(&mut self, course_id: Uuid) -> StoreResult<Vec<LabRow>> {
        self.query_children(queries::select_labs(Side::Draft), course_id, false, lab_from_row)
            .await
    }

    async fn draft_certificates(&mut self, course_id: Uuid) -> StoreResult<Vec<CertificateRow>> {
        self.query_children(
            queries::select_certificates(Side::Draft),
            course_id,
            false,
            certificate_from_row,
        )
        .await
    }

    async fn draft_rewards(&mut self, course_id: Uuid) -> StoreResult<Vec<CourseRewardRow>> {
        self.query_children(queries::select_rewards(Side::Draft), course_id, false, reward_from_row)
            .await
    }

    async fn draft_cards(&mut self, course_id: Uuid, kind: CardKind) -> StoreResult<Vec<CardRow>> {
        self.query_children(queries::select_cards(Side::Draft, kind), course_id, false, card_from_row)
            .await
    }

    async fn mark_draft_published(
        &mut self,
        id: Uuid,
        live_course_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.client()?
            .execute(queries::MARK_DRAFT_PUBLISHED, &[&id, &live_course_id, &at])
            .await?;
        Ok(())
    }

    async fn set_draft_status(
        &mut self,
        id: Uuid,
        status: CourseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.client()?
            .execute(queries::SET_DRAFT_STATUS, &[&id, &status.as_str(), &at])
            .await?;
        Ok(())
    }

    async fn live_course(&mut self, id: Uuid) -> StoreResult<Option<LiveCourse>> {
        let row = self.client()?.query_opt(&queries::select_live_course(false), &[&id]).await?;
        row.as_ref().map(live_course_from_row).transpose()
    }

    async fn lock_live_course(&mut self, id: Uuid) -> StoreResult<Option<LiveCourse>> {
        let row = self.client()?.query_opt(&queries::select_live_course(true), &[&id]).await?;
        row.as_ref().map(live_course_from_row).transpose()
    }

    async fn create_live_course(&mut self, course: &LiveCourse) -> StoreResult<()> {
        let d = &course.details;
        self.client()?
            .execute(
                &queries::insert_live_course(),
                &[
                    &course.id,
                    &d.name,
                    &d.description,
                    &d.level,
                    &d.category,
                    &d.thumbnail_url,
                    &d.price_cents,
                    &d.currency,
                    &d.is_free,
                    &course.status.as_str(),
                    &course.draft_course_id,
                    &course.version,
                    &course.published_at,
                    &course.created_at,
                    &course.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_live_course(&mut self, course: &LiveCourse) -> StoreResult<()> {
        let d = &course.details;
        self.client()?
            .execute(
                queries::UPDATE_LIVE_COURSE,
                &[
                    &course.id,
                    &d.name,
                    &d.description,
                    &d.level,
                    &d.category,
                    &d.thumbnail_url,
                    &d.price_cents,
                    &d.currency,
                    &d.is_free,
                    &course.status.as_str(),
                    &course.draft_course_id,
                    &course.version,
                    &course.published_at,
                    &course.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn set_live_course_status(
        &mut self,
        id: Uuid,
        status: CourseStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.client()?
            .execute(queries::SET_LIVE_STATUS, &[&id, &status.as_str(), &at])
            .await?;
        Ok(())
    }

    async fn clear_live_children(&mut self, live_course_id: Uuid) -> StoreResult<()> {
        let client = self.client()?;
        for table in queries::LIVE_COURSE_CHILD_TABLES {
            let deleted = client
                .execute(&queries::delete_by_course(table), &[&live_course_id])
                .await?;
            debug!("Cleared {} rows from {}", deleted, table);
        }
        Ok(())
    }

    async fn insert_live_module(&mut self, row: &ModuleRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_modules", queries::MODULE_COLUMNS),
                &[&row.id, &row.course_id, &row.title, &row.description, &row.order_index, &row.source_id, &row.created_at],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_lesson(&mut self, row: &LessonRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_lessons", queries::LESSON_COLUMNS),
                &[
                    &row.id,
                    &row.module_id,
                    &row.title,
                    &row.content,
                    &row.video_url,
                    &row.duration_minutes,
                    &row.order_index,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_note(&mut self, row: &AiNoteRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_ai_notes", queries::NOTE_COLUMNS),
                &[&row.id, &row.lesson_id, &row.content, &row.version, &row.source_id, &row.created_at],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_test(&mut self, row: &TestRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_tests", queries::TEST_COLUMNS),
                &[
                    &row.id,
                    &row.course_id,
                    &row.module_id,
                    &row.title,
                    &row.description,
                    &row.passing_score,
                    &row.time_limit_minutes,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_question(&mut self, row: &QuestionRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_questions", queries::QUESTION_COLUMNS),
                &[
                    &row.id,
                    &row.test_id,
                    &row.prompt,
                    &row.question_type,
                    &Json(&row.options),
                    &row.correct_answer,
                    &row.points,
                    &row.order_index,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_project(&mut self, row: &ProjectRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_projects", queries::PROJECT_COLUMNS),
                &[
                    &row.id,
                    &row.course_id,
                    &row.module_id,
                    &row.title,
                    &row.description,
                    &row.difficulty,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_project_step(&mut self, row: &ProjectStepRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_project_steps", queries::STEP_COLUMNS),
                &[
                    &row.id,
                    &row.project_id,
                    &row.step_number,
                    &row.title,
                    &row.instructions,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_lab(&mut self, row: &LabRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_labs", queries::LAB_COLUMNS),
                &[
                    &row.id,
                    &row.course_id,
                    &row.module_id,
                    &row.lesson_id,
                    &row.title,
                    &row.instructions,
                    &row.starter_code,
                    &row.language,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_certificate(&mut self, row: &CertificateRow) -> StoreResult<()> {
        self.client()?
            .execute(
                &queries::insert_into("live_certificates", queries::CERTIFICATE_COLUMNS),
                &[
                    &row.id,
                    &row.course_id,
                    &row.title,
                    &row.description,
                    &Json(&row.eligibility),
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_reward(&mut self, row: &CourseRewardRow) -> StoreResult<()> {
        let scholarship = row.scholarship_rule.as_ref().map(Json);
        self.client()?
            .execute(
                &queries::insert_into("live_course_rewards", queries::REWARD_COLUMNS),
                &[
                    &row.id,
                    &row.course_id,
                    &Json(&row.coin_rules),
                    &Json(&row.bonus_rules),
                    &scholarship,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_live_card(&mut self, kind: CardKind, row: &CardRow) -> StoreResult<()> {
        let table = Side::Live.table(kind.table_suffix());
        self.client()?
            .execute(
                &queries::insert_into(&table, queries::CARD_COLUMNS),
                &[
                    &row.id,
                    &row.course_id,
                    &row.title,
                    &row.message,
                    &row.icon,
                    &row.sort_order,
                    &row.source_id,
                    &row.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut uow = self;
        uow.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut uow = self;
        uow.finish("ROLLBACK").await
    }

    fn abandon(mut self: Box<Self>) {
        // Closing the connection makes the server roll back; a ROLLBACK would
        // queue behind whatever statement is still in flight.
        if let Some(client) = self.client.take() {
            debug!("Discarding connection of abandoned publish transaction");
            drop(Object::take(client));
        }
    }
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn map_rows<T>(rows: Vec<Row>, map: fn(&Row) -> T) -> Vec<T> {
    rows.iter().map(map).collect()
}

fn parse_status(table: &'static str, row: &Row) -> StoreResult<CourseStatus> {
    let raw: String = row.get("status");
    raw.parse()
        .map_err(|message| StoreError::Corrupt { table, message })
}

fn course_details(row: &Row) -> CourseDetails {
    CourseDetails {
        name: row.get("name"),
        description: row.get("description"),
        level: row.get("level"),
        category: row.get("category"),
        thumbnail_url: row.get("thumbnail_url"),
        price_cents: row.get("price_cents"),
        currency: row.get("currency"),
        is_free: row.get("is_free"),
    }
}

fn draft_course_from_row(row: &Row) -> StoreResult<DraftCourse> {
    Ok(DraftCourse {
        id: row.get("id"),
        details: course_details(row),
        status: parse_status("draft_courses", row)?,
        live_course_id: row.get("live_course_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn live_course_from_row(row: &Row) -> StoreResult<LiveCourse> {
    Ok(LiveCourse {
        id: row.get("id"),
        details: course_details(row),
        status: parse_status("live_courses", row)?,
        draft_course_id: row.get("draft_course_id"),
        version: row.get("version"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn module_from_row(row: &Row) -> ModuleRow {
    ModuleRow {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        description: row.get("description"),
        order_index: row.get("order_index"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn lesson_from_row(row: &Row) -> LessonRow {
    LessonRow {
        id: row.get("id"),
        module_id: row.get("module_id"),
        title: row.get("title"),
        content: row.get("content"),
        video_url: row.get("video_url"),
        duration_minutes: row.get("duration_minutes"),
        order_index: row.get("order_index"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn note_from_row(row: &Row) -> AiNoteRow {
    AiNoteRow {
        id: row.get("id"),
        lesson_id: row.get("lesson_id"),
        content: row.get("content"),
        version: row.get("version"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn test_from_row(row: &Row) -> TestRow {
    TestRow {
        id: row.get("id"),
        course_id: row.get("course_id"),
        module_id: row.get("module_id"),
        title: row.get("title"),
        description: row.get("description"),
        passing_score: row.get("passing_score"),
        time_limit_minutes: row.get("time_limit_minutes"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn question_from_row(row: &Row) -> QuestionRow {
    QuestionRow {
        id: row.get("id"),
        test_id: row.get("test_id"),
        prompt: row.get("prompt"),
        question_type: row.get("question_type"),
        options: row.get("options"),
        correct_answer: row.get("correct_answer"),
        points: row.get("points"),
        order_index: row.get("order_index"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn project_from_row(row: &Row) -> ProjectRow {
    ProjectRow {
        id: row.get("id"),
        course_id: row.get("course_id"),
        module_id: row.get("module_id"),
        title: row.get("title"),
        description: row.get("description"),
        difficulty: row.get("difficulty"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn step_from_row(row: &Row) -> ProjectStepRow {
    ProjectStepRow {
        id: row.get("id"),
        project_id: row.get("project_id"),
        step_number: row.get("step_number"),
        title: row.get("title"),
        instructions: row.get("instructions"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn lab_from_row(row: &Row) -> LabRow {
    LabRow {
        id: row.get("id"),
        course_id: row.get("course_id"),
        module_id: row.get("module_id"),
        lesson_id: row.get("lesson_id"),
        title: row.get("title"),
        instructions: row.get("instructions"),
        starter_code: row.get("starter_code"),
        language: row.get("language"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn certificate_from_row(row: &Row) -> CertificateRow {
    CertificateRow {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        description: row.get("description"),
        eligibility: row.get("eligibility"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn reward_from_row(row: &Row) -> CourseRewardRow {
    CourseRewardRow {
        id: row.get("id"),
        course_id: row.get("course_id"),
        coin_rules: row.get("coin_rules"),
        bonus_rules: row.get("bonus_rules"),
        scholarship_rule: row.get("scholarship_rule"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

fn card_from_row(row: &Row) -> CardRow {
    CardRow {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        message: row.get("message"),
        icon: row.get("icon"),
        sort_order: row.get("sort_order"),
        source_id: row.get("source_id"),
        created_at: row.get("created_at"),
    }
}

// Run with `DATABASE_URL=postgresql://... cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db::schema;
    use crate::publish::{PublishError, PublishOrchestrator};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Instant;

    async fn test_pool() -> Pool {
        let settings = Settings::load().expect("DATABASE_URL should parse");
        let pool = crate::db::create_pool(&settings.database, Duration::from_secs(5))
            .await
            .expect("database should be reachable");
        schema::create_course_tables(&pool).await.unwrap();
        pool
    }

    /// A draft course with one module and one lesson
    async fn seed_draft(pool: &Pool) -> Uuid {
        let client = pool.get().await.unwrap();
        let course_id = Uuid::new_v4();
        let module_id = Uuid::new_v4();
        client
            .execute(
                "INSERT INTO draft_courses (id, name) VALUES ($1, $2)",
                &[&course_id, &"Row locks in practice"],
            )
            .await
            .unwrap();
        client
            .execute(
                "INSERT INTO draft_modules (id, course_id, title) VALUES ($1, $2, $3)",
                &[&module_id, &course_id, &"Locking"],
            )
            .await
            .unwrap();
        client
            .execute(
                "INSERT INTO draft_lessons (id, module_id, title) VALUES ($1, $2, $3)",
                &[&Uuid::new_v4(), &module_id, &"FOR UPDATE"],
            )
            .await
            .unwrap();
        course_id
    }

    fn publisher(pool: &Pool, statement_timeout: Duration, timeout: Duration) -> PublishOrchestrator {
        PublishOrchestrator::new(
            Arc::new(PgCourseRepository::new(pool.clone(), statement_timeout)),
            timeout,
        )
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_publishes_serialize_on_draft_row() {
        let pool = test_pool().await;
        let draft_id = seed_draft(&pool).await;
        let publisher = Arc::new(publisher(&pool, Duration::from_secs(5), Duration::from_secs(10)));

        let first = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.publish(draft_id).await })
        };
        let second = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.publish(draft_id).await })
        };
        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();

        assert_eq!(a.live_course_id, b.live_course_id);
        let mut versions = vec![a.version, b.version];
        versions.sort();
        assert_eq!(versions, vec![1, 2]);

        let repo = PgCourseRepository::new(pool.clone(), Duration::from_secs(5));
        let snapshot = repo.live_course_snapshot(a.live_course_id).await.unwrap().unwrap();
        assert_eq!(snapshot.course.version, 2);
        assert_eq!(snapshot.graph.modules.len(), 1);
        assert_eq!(snapshot.graph.lessons.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_dropped_unit_of_work_discards_writes() {
        let pool = test_pool().await;
        let draft_id = seed_draft(&pool).await;
        let repo = PgCourseRepository::new(pool.clone(), Duration::from_secs(5));

        let mut uow = repo.begin().await.unwrap();
        let draft = uow.lock_draft_course(draft_id).await.unwrap().unwrap();
        let live = LiveCourse::from_draft(&draft, Utc::now());
        uow.create_live_course(&live).await.unwrap();
        drop(uow);

        assert!(repo.live_course_snapshot(live.id).await.unwrap().is_none());

        // The draft row lock went with the discarded connection
        let outcome = publisher(&pool, Duration::from_secs(5), Duration::from_secs(10))
            .publish(draft_id)
            .await
            .unwrap();
        assert!(outcome.created);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_second_live_course_for_draft_is_conflict() {
        let pool = test_pool().await;
        let draft_id = seed_draft(&pool).await;
        publisher(&pool, Duration::from_secs(5), Duration::from_secs(10))
            .publish(draft_id)
            .await
            .unwrap();

        let repo = PgCourseRepository::new(pool.clone(), Duration::from_secs(5));
        let mut uow = repo.begin().await.unwrap();
        let draft = uow.lock_draft_course(draft_id).await.unwrap().unwrap();
        let duplicate = LiveCourse::from_draft(&draft, Utc::now());
        let err = uow.create_live_course(&duplicate).await.unwrap_err();
        uow.rollback().await.unwrap();

        assert!(matches!(PublishError::from(err), PublishError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_statement_timeout_maps_to_timeout() {
        let pool = test_pool().await;
        let draft_id = seed_draft(&pool).await;

        // Hold the draft row from another session
        let holder = pool.get().await.unwrap();
        holder.batch_execute("BEGIN").await.unwrap();
        holder
            .query_one(queries::lock_draft_course().as_str(), &[&draft_id])
            .await
            .unwrap();

        let err = publisher(&pool, Duration::from_millis(200), Duration::from_secs(10))
            .publish(draft_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout(_)));

        holder.batch_execute("ROLLBACK").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_publish_deadline_does_not_wait_on_blocked_statement() {
        let pool = test_pool().await;
        let draft_id = seed_draft(&pool).await;

        let holder = pool.get().await.unwrap();
        holder.batch_execute("BEGIN").await.unwrap();
        holder
            .query_one(queries::lock_draft_course().as_str(), &[&draft_id])
            .await
            .unwrap();

        let started = Instant::now();
        let err = publisher(&pool, Duration::from_secs(30), Duration::from_millis(200))
            .publish(draft_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));

        holder.batch_execute("ROLLBACK").await.unwrap();
    }
}
