//! SQL query constants and builders
//!
//! Draft and live child tables share one layout, so child queries are built
//! per [`Side`] from the same column lists.

use crate::models::CardKind;

/// Which aggregate a table belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Draft,
    Live,
}

impl Side {
    pub fn table(&self, name: &str) -> String {
        match self {
            Side::Draft => format!("draft_{}", name),
            Side::Live => format!("live_{}", name),
        }
    }
}

pub const DRAFT_COURSE_COLUMNS: &str = "id, name, description, level, category, thumbnail_url, \
     price_cents, currency, is_free, status, live_course_id, published_at, created_at, updated_at";

pub const LIVE_COURSE_COLUMNS: &str = "id, name, description, level, category, thumbnail_url, \
     price_cents, currency, is_free, status, draft_course_id, version, published_at, created_at, updated_at";

pub const MODULE_COLUMNS: &str = "id, course_id, title, description, order_index, source_id, created_at";

pub const LESSON_COLUMNS: &str =
    "id, module_id, title, content, video_url, duration_minutes, order_index, source_id, created_at";

pub const NOTE_COLUMNS: &str = "id, lesson_id, content, version, source_id, created_at";

pub const TEST_COLUMNS: &str = "id, course_id, module_id, title, description, passing_score, \
     time_limit_minutes, source_id, created_at";

pub const QUESTION_COLUMNS: &str = "id, test_id, prompt, question_type, options, correct_answer, \
     points, order_index, source_id, created_at";

pub const PROJECT_COLUMNS: &str =
    "id, course_id, module_id, title, description, difficulty, source_id, created_at";

pub const STEP_COLUMNS: &str = "id, project_id, step_number, title, instructions, source_id, created_at";

pub const LAB_COLUMNS: &str = "id, course_id, module_id, lesson_id, title, instructions, \
     starter_code, language, source_id, created_at";

pub const CERTIFICATE_COLUMNS: &str =
    "id, course_id, title, description, eligibility, source_id, created_at";

pub const REWARD_COLUMNS: &str =
    "id, course_id, coin_rules, bonus_rules, scholarship_rule, source_id, created_at";

pub const CARD_COLUMNS: &str = "id, course_id, title, message, icon, sort_order, source_id, created_at";

/// Fetch a draft course and lock its row for the rest of the transaction
pub fn lock_draft_course() -> String {
    format!(
        "SELECT {} FROM draft_courses WHERE id = $1 FOR UPDATE",
        DRAFT_COURSE_COLUMNS
    )
}

pub fn select_draft_course() -> String {
    format!("SELECT {} FROM draft_courses WHERE id = $1", DRAFT_COURSE_COLUMNS)
}

pub const MARK_DRAFT_PUBLISHED: &str = r#"
    UPDATE draft_courses
    SET live_course_id = $2, status = 'published', published_at = $3, updated_at = $3
    WHERE id = $1
"#;

pub const SET_DRAFT_STATUS: &str = r#"
    UPDATE draft_courses SET status = $2, updated_at = $3 WHERE id = $1
"#;

pub fn select_live_course(for_update: bool) -> String {
    format!(
        "SELECT {} FROM live_courses WHERE id = $1{}",
        LIVE_COURSE_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    )
}

pub fn insert_live_course() -> String {
    format!(
        "INSERT INTO live_courses ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        LIVE_COURSE_COLUMNS
    )
}

pub const UPDATE_LIVE_COURSE: &str = r#"
    UPDATE live_courses
    SET name = $2, description = $3, level = $4, category = $5, thumbnail_url = $6,
        price_cents = $7, currency = $8, is_free = $9, status = $10,
        draft_course_id = $11, version = $12, published_at = $13, updated_at = $14
    WHERE id = $1
"#;

pub const SET_LIVE_STATUS: &str = r#"
    UPDATE live_courses SET status = $2, updated_at = $3 WHERE id = $1
"#;

/// Course-scoped live tables, cleared on republish. Lessons, notes,
/// questions and steps cascade from these.
pub const LIVE_COURSE_CHILD_TABLES: [&str; 8] = [
    "live_modules",
    "live_tests",
    "live_projects",
    "live_labs",
    "live_certificates",
    "live_course_rewards",
    "live_achievement_cards",
    "live_motivational_cards",
];

pub fn delete_by_course(table: &str) -> String {
    format!("DELETE FROM {} WHERE course_id = $1", table)
}

// Child selects. Parent-keyed selects take an array so one statement serves
// both a single parent and a whole snapshot.

pub fn select_modules(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE course_id = $1 ORDER BY order_index, created_at, id",
        MODULE_COLUMNS,
        side.table("modules")
    )
}

pub fn select_lessons(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE module_id = ANY($1) ORDER BY module_id, order_index, created_at, id",
        LESSON_COLUMNS,
        side.table("lessons")
    )
}

pub fn select_notes(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE lesson_id = ANY($1) ORDER BY lesson_id, version, created_at, id",
        NOTE_COLUMNS,
        side.table("ai_notes")
    )
}

pub fn select_tests(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE course_id = $1 ORDER BY created_at, id",
        TEST_COLUMNS,
        side.table("tests")
    )
}

pub fn select_questions(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE test_id = ANY($1) ORDER BY test_id, order_index, created_at, id",
        QUESTION_COLUMNS,
        side.table("questions")
    )
}

pub fn select_projects(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE course_id = $1 ORDER BY created_at, id",
        PROJECT_COLUMNS,
        side.table("projects")
    )
}

pub fn select_steps(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE project_id = ANY($1) ORDER BY project_id, step_number, created_at, id",
        STEP_COLUMNS,
        side.table("project_steps")
    )
}

pub fn select_labs(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE course_id = $1 ORDER BY created_at, id",
        LAB_COLUMNS,
        side.table("labs")
    )
}

pub fn select_certificates(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE course_id = $1 ORDER BY created_at, id",
        CERTIFICATE_COLUMNS,
        side.table("certificates")
    )
}

pub fn select_rewards(side: Side) -> String {
    format!(
        "SELECT {} FROM {} WHERE course_id = $1 ORDER BY created_at, id",
        REWARD_COLUMNS,
        side.table("course_rewards")
    )
}

pub fn select_cards(side: Side, kind: CardKind) -> String {
    format!(
        "SELECT {} FROM {} WHERE course_id = $1 ORDER BY sort_order, created_at, id",
        CARD_COLUMNS,
        side.table(kind.table_suffix())
    )
}

/// `INSERT INTO <table> (<columns>) VALUES ($1, ..., $n)`
pub fn insert_into(table: &str, columns: &str) -> String {
    let placeholders: Vec<String> = (1..=columns.split(',').count())
        .map(|i| format!("${}", i))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns,
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_side_prefixes_tables() {
        assert_eq!(Side::Draft.table("modules"), "draft_modules");
        assert_eq!(Side::Live.table("modules"), "live_modules");
    }

    #[test]
    fn test_insert_placeholders_match_columns() {
        let sql = insert_into("live_ai_notes", NOTE_COLUMNS);
        assert_eq!(
            sql,
            "INSERT INTO live_ai_notes (id, lesson_id, content, version, source_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
    }

    #[test]
    fn test_child_selects_are_explicitly_ordered() {
        assert!(select_modules(Side::Draft).ends_with("ORDER BY order_index, created_at, id"));
        assert!(select_lessons(Side::Draft).contains("ORDER BY module_id, order_index"));
        assert!(select_questions(Side::Draft).contains("ORDER BY test_id, order_index"));
        assert!(select_steps(Side::Draft).contains("ORDER BY project_id, step_number"));
        assert!(select_cards(Side::Live, CardKind::Motivational)
            .contains("FROM live_motivational_cards WHERE course_id = $1 ORDER BY sort_order"));
    }
}
