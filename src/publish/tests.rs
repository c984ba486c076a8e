use super::*;
use crate::db::memory::{InjectedFault, MemoryCourseRepository};
use crate::db::repository::{CourseRepository, EntityKind};
use crate::models::*;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

/// Builds a draft course graph with strictly increasing timestamps
struct DraftBuilder {
    course: DraftCourse,
    graph: CourseGraph,
    clock: DateTime<Utc>,
}

impl DraftBuilder {
    fn new(name: &str) -> Self {
        Self {
            course: DraftCourse::new(CourseDetails {
                name: name.to_string(),
                level: Some("beginner".to_string()),
                ..Default::default()
            }),
            graph: CourseGraph::default(),
            clock: Utc::now() - ChronoDuration::hours(1),
        }
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += ChronoDuration::seconds(1);
        self.clock
    }

    fn module(&mut self, title: &str, order_index: i32) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.modules.push(ModuleRow {
            id,
            course_id: self.course.id,
            title: title.to_string(),
            description: None,
            order_index,
            source_id: None,
            created_at,
        });
        id
    }

    fn lesson(&mut self, module_id: Uuid, title: &str, order_index: i32) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.lessons.push(LessonRow {
            id,
            module_id,
            title: title.to_string(),
            content: Some(format!("{} content", title)),
            video_url: None,
            duration_minutes: Some(10),
            order_index,
            source_id: None,
            created_at,
        });
        id
    }

    fn note(&mut self, lesson_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.notes.push(AiNoteRow {
            id,
            lesson_id,
            content: "Summary".to_string(),
            version: 1,
            source_id: None,
            created_at,
        });
        id
    }

    fn test(&mut self, module_id: Option<Uuid>, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.tests.push(TestRow {
            id,
            course_id: self.course.id,
            module_id,
            title: title.to_string(),
            description: None,
            passing_score: 70,
            time_limit_minutes: Some(15),
            source_id: None,
            created_at,
        });
        id
    }

    fn question(&mut self, test_id: Uuid, prompt: &str, order_index: i32) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.questions.push(QuestionRow {
            id,
            test_id,
            prompt: prompt.to_string(),
            question_type: "multiple_choice".to_string(),
            options: json!(["a", "b", "c"]),
            correct_answer: Some("a".to_string()),
            points: 1,
            order_index,
            source_id: None,
            created_at,
        });
        id
    }

    fn project(&mut self, module_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.projects.push(ProjectRow {
            id,
            course_id: self.course.id,
            module_id,
            title: "Capstone".to_string(),
            description: None,
            difficulty: Some("medium".to_string()),
            source_id: None,
            created_at,
        });
        id
    }

    fn step(&mut self, project_id: Uuid, step_number: i32) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.steps.push(ProjectStepRow {
            id,
            project_id,
            step_number,
            title: format!("Step {}", step_number),
            instructions: None,
            source_id: None,
            created_at,
        });
        id
    }

    fn lab(&mut self, module_id: Option<Uuid>, lesson_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.labs.push(LabRow {
            id,
            course_id: self.course.id,
            module_id,
            lesson_id,
            title: "Practice".to_string(),
            instructions: None,
            starter_code: None,
            language: Some("rust".to_string()),
            source_id: None,
            created_at,
        });
        id
    }

    fn certificate(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.certificates.push(CertificateRow {
            id,
            course_id: self.course.id,
            title: "Certificate of Completion".to_string(),
            description: None,
            eligibility: json!({"minScore": 80, "allLessons": true}),
            source_id: None,
            created_at,
        });
        id
    }

    fn reward(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        self.graph.rewards.push(CourseRewardRow {
            id,
            course_id: self.course.id,
            coin_rules: json!({"perLesson": 5}),
            bonus_rules: json!({"perfectTest": 25}),
            scholarship_rule: None,
            source_id: None,
            created_at,
        });
        id
    }

    fn card(&mut self, kind: CardKind, title: &str, sort_order: i32) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = self.tick();
        let course_id = self.course.id;
        self.graph.cards_mut(kind).push(CardRow {
            id,
            course_id,
            title: title.to_string(),
            message: None,
            icon: None,
            sort_order,
            source_id: None,
            created_at,
        });
        id
    }

    async fn seed(self, repo: &MemoryCourseRepository) -> Uuid {
        let id = self.course.id;
        repo.seed_draft(self.course, self.graph).await;
        id
    }
}

fn orchestrator(repo: &MemoryCourseRepository) -> PublishOrchestrator {
    PublishOrchestrator::new(Arc::new(repo.clone()), Duration::from_secs(5))
}

/// Module A (L1, L2) and Module B (L3); a 3-question test on A; a lab on L1
struct Scenario {
    draft_id: Uuid,
    module_a: Uuid,
    lesson_1: Uuid,
}

async fn seed_scenario(repo: &MemoryCourseRepository) -> Scenario {
    let mut draft = DraftBuilder::new("Intro to Rust");
    let module_a = draft.module("Module A", 0);
    let module_b = draft.module("Module B", 1);
    let lesson_1 = draft.lesson(module_a, "L1", 0);
    draft.lesson(module_a, "L2", 1);
    draft.lesson(module_b, "L3", 0);
    let test = draft.test(Some(module_a), "Module A quiz");
    for i in 0..3 {
        draft.question(test, &format!("Q{}", i + 1), i);
    }
    draft.lab(Some(module_a), Some(lesson_1));
    let draft_id = draft.seed(repo).await;
    Scenario {
        draft_id,
        module_a,
        lesson_1,
    }
}

async fn snapshot(repo: &MemoryCourseRepository, live_id: Uuid) -> LiveCourseSnapshot {
    repo.live_course_snapshot(live_id)
        .await
        .unwrap()
        .expect("live course should exist")
}

fn live_id_for(graph: &CourseGraph, draft_id: Uuid) -> Uuid {
    let modules = graph.modules.iter().map(|m| (m.id, m.source_id));
    let lessons = graph.lessons.iter().map(|l| (l.id, l.source_id));
    modules
        .chain(lessons)
        .find(|(_, source)| *source == Some(draft_id))
        .map(|(id, _)| id)
        .expect("draft row should have a live clone")
}

#[tokio::test]
async fn test_publish_scenario_remaps_every_reference() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;

    let outcome = assert_ok!(orchestrator(&repo).publish(scenario.draft_id).await);
    assert!(outcome.created);
    assert_eq!(outcome.version, 1);

    let live = snapshot(&repo, outcome.live_course_id).await;
    assert_eq!(live.course.status, CourseStatus::Published);
    assert_eq!(live.course.draft_course_id, Some(scenario.draft_id));
    assert_eq!(live.graph.modules.len(), 2);
    assert_eq!(live.graph.lessons.len(), 3);
    assert_eq!(live.graph.tests.len(), 1);
    assert_eq!(live.graph.questions.len(), 3);
    assert_eq!(live.graph.labs.len(), 1);

    let live_module_a = live_id_for(&live.graph, scenario.module_a);
    let live_lesson_1 = live_id_for(&live.graph, scenario.lesson_1);
    assert_eq!(live.graph.tests[0].module_id, Some(live_module_a));
    assert_eq!(live.graph.labs[0].lesson_id, Some(live_lesson_1));
    assert_eq!(live.graph.labs[0].module_id, Some(live_module_a));
    assert!(live.graph.questions.iter().all(|q| q.test_id == live.graph.tests[0].id));

    // Every parent reference resolves inside the live aggregate.
    let module_ids: HashSet<Uuid> = live.graph.modules.iter().map(|m| m.id).collect();
    assert!(live.graph.lessons.iter().all(|l| module_ids.contains(&l.module_id)));
    assert!(live.graph.modules.iter().all(|m| m.course_id == outcome.live_course_id));

    let draft = repo.find_draft_course(scenario.draft_id).await.unwrap().unwrap();
    assert_eq!(draft.status, CourseStatus::Published);
    assert_eq!(draft.live_course_id, Some(outcome.live_course_id));
    assert!(draft.published_at.is_some());
}

#[tokio::test]
async fn test_publish_copies_every_entity_kind() {
    let repo = MemoryCourseRepository::new();
    let mut draft = DraftBuilder::new("Full course");
    let module = draft.module("Only module", 0);
    let lesson = draft.lesson(module, "Only lesson", 0);
    draft.note(lesson);
    let project = draft.project(Some(module));
    draft.step(project, 1);
    draft.step(project, 2);
    draft.lab(None, None);
    draft.certificate();
    draft.reward();
    draft.card(CardKind::Achievement, "First lesson", 0);
    draft.card(CardKind::Motivational, "Keep going", 0);
    draft.card(CardKind::Motivational, "Almost there", 1);
    let draft_id = draft.seed(&repo).await;

    let outcome = orchestrator(&repo).publish(draft_id).await.unwrap();

    assert_eq!(
        outcome.counts,
        CloneCounts {
            modules: 1,
            lessons: 1,
            notes: 1,
            tests: 0,
            questions: 0,
            projects: 1,
            steps: 2,
            labs: 1,
            certificates: 1,
            rewards: 1,
            achievement_cards: 1,
            motivational_cards: 2,
        }
    );

    let live = snapshot(&repo, outcome.live_course_id).await;
    assert_eq!(live.graph.notes[0].lesson_id, live.graph.lessons[0].id);
    assert_eq!(live.graph.projects[0].module_id, Some(live.graph.modules[0].id));
    assert!(live.graph.steps.iter().all(|s| s.project_id == live.graph.projects[0].id));
    assert_eq!(live.graph.labs[0].module_id, None);
    assert_eq!(live.graph.labs[0].lesson_id, None);
    assert_eq!(live.graph.certificates[0].eligibility["minScore"], 80);
    assert_eq!(live.graph.rewards[0].course_id, outcome.live_course_id);
    let titles: Vec<&str> = live.graph.motivational_cards.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Keep going", "Almost there"]);
}

#[tokio::test]
async fn test_publish_follows_sequencing_order() {
    let repo = MemoryCourseRepository::new();
    let mut draft = DraftBuilder::new("Ordering");
    // Inserted out of order on purpose
    let second = draft.module("Second", 2);
    let first = draft.module("First", 1);
    draft.lesson(first, "1.2", 2);
    draft.lesson(first, "1.1", 1);
    draft.lesson(second, "2.1", 1);
    let project = draft.project(None);
    draft.step(project, 3);
    draft.step(project, 1);
    draft.step(project, 2);
    let test = draft.test(None, "Quiz");
    draft.question(test, "last", 9);
    draft.question(test, "first", 0);
    let draft_id = draft.seed(&repo).await;

    let outcome = orchestrator(&repo).publish(draft_id).await.unwrap();
    let live = snapshot(&repo, outcome.live_course_id).await;

    let modules: Vec<&str> = live.graph.modules.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(modules, vec!["First", "Second"]);

    let first_live = live.graph.modules[0].id;
    let lessons: Vec<&str> = live
        .graph
        .lessons
        .iter()
        .filter(|l| l.module_id == first_live)
        .map(|l| l.title.as_str())
        .collect();
    assert_eq!(lessons, vec!["1.1", "1.2"]);

    let steps: Vec<i32> = live.graph.steps.iter().map(|s| s.step_number).collect();
    assert_eq!(steps, vec![1, 2, 3]);
    let prompts: Vec<&str> = live.graph.questions.iter().map(|q| q.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["first", "last"]);
}

#[tokio::test]
async fn test_publish_without_modules_writes_nothing() {
    let repo = MemoryCourseRepository::new();
    let mut draft = DraftBuilder::new("Empty");
    draft.certificate();
    let draft_id = draft.seed(&repo).await;

    let err = assert_err!(orchestrator(&repo).publish(draft_id).await);
    assert!(matches!(err, PublishError::Validation(_)));
    assert!(err.to_string().contains("module"));
    assert!(repo.live_courses().await.is_empty());
    assert!(repo.live_graph().await.is_empty());
}

#[tokio::test]
async fn test_publish_without_lessons_writes_nothing() {
    let repo = MemoryCourseRepository::new();
    let mut draft = DraftBuilder::new("Hollow");
    draft.module("A", 0);
    draft.module("B", 1);
    let draft_id = draft.seed(&repo).await;

    let err = assert_err!(orchestrator(&repo).publish(draft_id).await);
    assert!(matches!(err, PublishError::Validation(_)));
    assert!(err.to_string().contains("lesson"));
    assert!(repo.live_courses().await.is_empty());
    assert!(repo.live_graph().await.is_empty());

    let draft = repo.find_draft_course(draft_id).await.unwrap().unwrap();
    assert_eq!(draft.status, CourseStatus::Draft);
}

#[tokio::test]
async fn test_publish_unknown_draft_is_not_found() {
    let repo = MemoryCourseRepository::new();
    let err = orchestrator(&repo).publish(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PublishError::NotFound(_)));
}

#[tokio::test]
async fn test_publish_refuses_generating_course() {
    let repo = MemoryCourseRepository::new();
    let mut draft = DraftBuilder::new("Still generating");
    draft.course.status = CourseStatus::Generating;
    let module = draft.module("A", 0);
    draft.lesson(module, "L", 0);
    let draft_id = draft.seed(&repo).await;

    let err = orchestrator(&repo).publish(draft_id).await.unwrap_err();
    assert_eq!(
        err,
        PublishError::InvalidState("cannot publish while generating".to_string())
    );
    assert!(repo.live_courses().await.is_empty());
}

#[tokio::test]
async fn test_republish_keeps_live_id_and_bumps_version() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    let publisher = orchestrator(&repo);

    let first = publisher.publish(scenario.draft_id).await.unwrap();
    let before = snapshot(&repo, first.live_course_id).await;
    let second = publisher.publish(scenario.draft_id).await.unwrap();
    let third = publisher.publish(scenario.draft_id).await.unwrap();

    assert_eq!(first.live_course_id, second.live_course_id);
    assert_eq!(second.live_course_id, third.live_course_id);
    assert!(!second.created);
    assert_eq!((first.version, second.version, third.version), (1, 2, 3));
    assert_eq!(repo.live_courses().await.len(), 1);

    // Children are replaced, not duplicated; source ids are the stable key.
    let after = snapshot(&repo, third.live_course_id).await;
    assert_eq!(after.graph.modules.len(), 2);
    assert_eq!(after.graph.lessons.len(), 3);
    assert_eq!(after.graph.questions.len(), 3);
    assert_eq!(repo.live_graph().await.lessons.len(), 3);
    assert_ne!(before.graph.modules[0].id, after.graph.modules[0].id);
    assert_eq!(before.graph.modules[0].source_id, after.graph.modules[0].source_id);
}

#[tokio::test]
async fn test_republish_reflects_draft_edits() {
    let repo = MemoryCourseRepository::new();
    let mut draft = DraftBuilder::new("Before");
    let module = draft.module("A", 0);
    draft.lesson(module, "L", 0);
    let mut course = draft.course.clone();
    let draft_id = draft.seed(&repo).await;
    let publisher = orchestrator(&repo);

    let first = publisher.publish(draft_id).await.unwrap();

    course.details.name = "After".to_string();
    course.live_course_id = Some(first.live_course_id);
    repo.update_draft(course).await;
    publisher.publish(draft_id).await.unwrap();

    let live = snapshot(&repo, first.live_course_id).await;
    assert_eq!(live.course.details.name, "After");
    assert_eq!(live.course.version, 2);
}

#[tokio::test]
async fn test_publish_recreates_missing_live_course() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    let publisher = orchestrator(&repo);

    let first = publisher.publish(scenario.draft_id).await.unwrap();
    repo.remove_live_course(first.live_course_id).await;

    let second = publisher.publish(scenario.draft_id).await.unwrap();
    assert!(second.created);
    assert_ne!(second.live_course_id, first.live_course_id);
    assert_eq!(second.version, 1);
}

#[tokio::test]
async fn test_unpublish_then_publish_round_trip() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    let publisher = orchestrator(&repo);

    let first = publisher.publish(scenario.draft_id).await.unwrap();
    let unpublished = publisher.unpublish(first.live_course_id).await.unwrap();
    assert_eq!(unpublished.draft_course_id, Some(scenario.draft_id));

    // Status only: rows stay, draft reopens, link survives.
    let live = snapshot(&repo, first.live_course_id).await;
    assert_eq!(live.course.status, CourseStatus::Unpublished);
    assert_eq!(live.graph.modules.len(), 2);
    assert_eq!(live.graph.lessons.len(), 3);
    let draft = repo.find_draft_course(scenario.draft_id).await.unwrap().unwrap();
    assert_eq!(draft.status, CourseStatus::Draft);
    assert_eq!(draft.live_course_id, Some(first.live_course_id));

    let again = publisher.publish(scenario.draft_id).await.unwrap();
    assert_eq!(again.live_course_id, first.live_course_id);
    assert_eq!(again.version, 2);
    let live = snapshot(&repo, again.live_course_id).await;
    assert_eq!(live.course.status, CourseStatus::Published);
}

#[tokio::test]
async fn test_unpublish_requires_published_live_course() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    let publisher = orchestrator(&repo);

    let missing = publisher.unpublish(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, PublishError::NotFound(_)));

    let outcome = publisher.publish(scenario.draft_id).await.unwrap();
    publisher.unpublish(outcome.live_course_id).await.unwrap();
    let twice = publisher.unpublish(outcome.live_course_id).await.unwrap_err();
    assert!(matches!(twice, PublishError::InvalidState(_)));
}

#[tokio::test]
async fn test_unpublish_draft_resolves_live_link() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    let publisher = orchestrator(&repo);

    let never_published = publisher.unpublish_draft(scenario.draft_id).await.unwrap_err();
    assert!(matches!(never_published, PublishError::NotFound(_)));

    let outcome = publisher.publish(scenario.draft_id).await.unwrap();
    let unpublished = publisher.unpublish_draft(scenario.draft_id).await.unwrap();
    assert_eq!(unpublished.live_course_id, outcome.live_course_id);
}

#[tokio::test]
async fn test_concurrent_publishes_share_one_live_course() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    let publisher = Arc::new(orchestrator(&repo));

    let (a, b) = tokio::join!(
        {
            let publisher = publisher.clone();
            let id = scenario.draft_id;
            tokio::spawn(async move { publisher.publish(id).await })
        },
        {
            let publisher = publisher.clone();
            let id = scenario.draft_id;
            tokio::spawn(async move { publisher.publish(id).await })
        }
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    assert_eq!(a.live_course_id, b.live_course_id);
    let mut versions = vec![a.version, b.version];
    versions.sort();
    assert_eq!(versions, vec![1, 2]);
    assert_eq!(repo.live_courses().await.len(), 1);
    assert_eq!(repo.live_graph().await.modules.len(), 2);
}

#[tokio::test]
async fn test_failure_mid_clone_leaves_no_trace() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    repo.inject_fault(InjectedFault::fail(EntityKind::Lab, 0)).await;

    let err = orchestrator(&repo).publish(scenario.draft_id).await.unwrap_err();
    assert!(matches!(err, PublishError::Internal(_)));
    assert!(err.to_string().contains("lab"));

    assert!(repo.live_courses().await.is_empty());
    assert!(repo.live_graph().await.is_empty());
    let draft = repo.find_draft_course(scenario.draft_id).await.unwrap().unwrap();
    assert_eq!(draft.status, CourseStatus::Draft);
    assert_eq!(draft.live_course_id, None);
}

#[tokio::test]
async fn test_failed_republish_keeps_previous_live_graph() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    let publisher = orchestrator(&repo);
    let first = publisher.publish(scenario.draft_id).await.unwrap();
    let before = snapshot(&repo, first.live_course_id).await;

    repo.inject_fault(InjectedFault::fail(EntityKind::Question, 2)).await;
    let err = publisher.publish(scenario.draft_id).await.unwrap_err();
    assert!(matches!(err, PublishError::Internal(_)));

    let after = snapshot(&repo, first.live_course_id).await;
    assert_eq!(after, before);
    assert_eq!(after.course.version, 1);

    // The fault is one-shot; the next attempt goes through.
    let retry = publisher.publish(scenario.draft_id).await.unwrap();
    assert_eq!(retry.version, 2);
}

#[tokio::test]
async fn test_publish_past_deadline_rolls_back() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    repo.inject_fault(InjectedFault::stall(EntityKind::Question, 1, Duration::from_secs(30)))
        .await;
    let publisher = PublishOrchestrator::new(Arc::new(repo.clone()), Duration::from_millis(50));

    let started = Instant::now();
    let err = publisher.publish(scenario.draft_id).await.unwrap_err();
    assert!(matches!(err, PublishError::Timeout(_)));
    // The stalled session is abandoned, not waited on
    assert!(started.elapsed() < Duration::from_secs(2));

    // The session lock is released and nothing was committed
    assert!(repo.live_courses().await.is_empty());
    assert!(repo.live_graph().await.is_empty());
    let draft = repo.find_draft_course(scenario.draft_id).await.unwrap().unwrap();
    assert_eq!(draft.status, CourseStatus::Draft);

    let retry = assert_ok!(orchestrator(&repo).publish(scenario.draft_id).await);
    assert_eq!(retry.version, 1);
}

#[tokio::test]
async fn test_publish_waiting_for_busy_store_times_out() {
    let repo = MemoryCourseRepository::new();
    let scenario = seed_scenario(&repo).await;
    repo.inject_fault(InjectedFault::stall(EntityKind::Question, 1, Duration::from_secs(30)))
        .await;

    // The first publish holds the store session while it stalls
    let holder = {
        let publisher = orchestrator(&repo);
        let id = scenario.draft_id;
        tokio::spawn(async move { publisher.publish(id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let impatient = PublishOrchestrator::new(Arc::new(repo.clone()), Duration::from_millis(50));
    let started = Instant::now();
    let err = impatient.publish(scenario.draft_id).await.unwrap_err();
    assert!(matches!(err, PublishError::Timeout(_)));
    assert!(err.to_string().contains("waiting for a session"));
    assert!(started.elapsed() < Duration::from_secs(2));

    let started = Instant::now();
    let err = impatient.unpublish_draft(scenario.draft_id).await.unwrap_err();
    assert!(matches!(err, PublishError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(2));

    holder.abort();
    assert!(holder.await.unwrap_err().is_cancelled());

    // Neither call left anything behind
    assert!(repo.live_courses().await.is_empty());
    let draft = repo.find_draft_course(scenario.draft_id).await.unwrap().unwrap();
    assert_eq!(draft.live_course_id, None);
}

#[tokio::test]
async fn test_dangling_module_reference_is_dropped() {
    let repo = MemoryCourseRepository::new();
    let mut draft = DraftBuilder::new("Stale pointer");
    let module = draft.module("A", 0);
    draft.lesson(module, "L", 0);
    // Points at a module of some other course
    draft.test(Some(Uuid::new_v4()), "Orphaned quiz");
    let draft_id = draft.seed(&repo).await;

    let outcome = orchestrator(&repo).publish(draft_id).await.unwrap();
    let live = snapshot(&repo, outcome.live_course_id).await;
    assert_eq!(live.graph.tests.len(), 1);
    assert_eq!(live.graph.tests[0].module_id, None);
}
