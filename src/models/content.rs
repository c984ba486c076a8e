//! Course content rows
//!
//! Draft and live tables share one schema per entity kind, so each kind has a
//! single row type used on both sides. `source_id` is only set on live rows
//! and names the draft row the live row was cloned from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::course::LiveCourse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRow {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub order_index: i32,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// AI-generated study note attached to a lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiNoteRow {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub content: String,
    pub version: i32,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub module_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub passing_score: i32,
    pub time_limit_minutes: Option<i32>,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRow {
    pub id: Uuid,
    pub test_id: Uuid,
    pub prompt: String,
    pub question_type: String,
    pub options: Value,
    pub correct_answer: Option<String>,
    pub points: i32,
    pub order_index: i32,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub module_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStepRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub step_number: i32,
    pub title: String,
    pub instructions: Option<String>,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Practice lab, scoped to the course and optionally to a module and/or lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub module_id: Option<Uuid>,
    pub lesson_id: Option<Uuid>,
    pub title: String,
    pub instructions: Option<String>,
    pub starter_code: Option<String>,
    pub language: Option<String>,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Eligibility rule bag (minimum score, required completions, ...)
    pub eligibility: Value,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRewardRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub coin_rules: Value,
    pub bonus_rules: Value,
    pub scholarship_rule: Option<Value>,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Gamification card kinds; each lives in its own table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Achievement,
    Motivational,
}

impl CardKind {
    pub fn table_suffix(&self) -> &'static str {
        match self {
            CardKind::Achievement => "achievement_cards",
            CardKind::Motivational => "motivational_cards",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub message: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i32,
    pub source_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Every child row beneath one course, flattened per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGraph {
    pub modules: Vec<ModuleRow>,
    pub lessons: Vec<LessonRow>,
    pub notes: Vec<AiNoteRow>,
    pub tests: Vec<TestRow>,
    pub questions: Vec<QuestionRow>,
    pub projects: Vec<ProjectRow>,
    pub steps: Vec<ProjectStepRow>,
    pub labs: Vec<LabRow>,
    pub certificates: Vec<CertificateRow>,
    pub rewards: Vec<CourseRewardRow>,
    pub achievement_cards: Vec<CardRow>,
    pub motivational_cards: Vec<CardRow>,
}

impl CourseGraph {
    pub fn cards(&self, kind: CardKind) -> &Vec<CardRow> {
        match kind {
            CardKind::Achievement => &self.achievement_cards,
            CardKind::Motivational => &self.motivational_cards,
        }
    }

    pub fn cards_mut(&mut self, kind: CardKind) -> &mut Vec<CardRow> {
        match kind {
            CardKind::Achievement => &mut self.achievement_cards,
            CardKind::Motivational => &mut self.motivational_cards,
        }
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
            && self.lessons.is_empty()
            && self.notes.is_empty()
            && self.tests.is_empty()
            && self.questions.is_empty()
            && self.projects.is_empty()
            && self.steps.is_empty()
            && self.labs.is_empty()
            && self.certificates.is_empty()
            && self.rewards.is_empty()
            && self.achievement_cards.is_empty()
            && self.motivational_cards.is_empty()
    }
}

/// A live course together with its whole published graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveCourseSnapshot {
    pub course: LiveCourse,
    #[serde(flatten)]
    pub graph: CourseGraph,
}
