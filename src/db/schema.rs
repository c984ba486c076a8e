//! Table definitions for the draft and live stores

use super::queries::Side;
use deadpool_postgres::Pool;
use tracing::info;

/// Child tables shared by both sides, in parent-before-child order.
/// `{p}` is replaced with the side prefix.
const CHILD_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS {p}modules (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT,
        order_index INTEGER NOT NULL DEFAULT 0,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}lessons (
        id UUID PRIMARY KEY,
        module_id UUID NOT NULL REFERENCES {p}modules(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        content TEXT,
        video_url TEXT,
        duration_minutes INTEGER,
        order_index INTEGER NOT NULL DEFAULT 0,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}ai_notes (
        id UUID PRIMARY KEY,
        lesson_id UUID NOT NULL REFERENCES {p}lessons(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 1,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}tests (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        module_id UUID REFERENCES {p}modules(id) ON DELETE SET NULL,
        title TEXT NOT NULL,
        description TEXT,
        passing_score INTEGER NOT NULL DEFAULT 70,
        time_limit_minutes INTEGER,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}questions (
        id UUID PRIMARY KEY,
        test_id UUID NOT NULL REFERENCES {p}tests(id) ON DELETE CASCADE,
        prompt TEXT NOT NULL,
        question_type VARCHAR(50) NOT NULL,
        options JSONB NOT NULL DEFAULT '[]',
        correct_answer TEXT,
        points INTEGER NOT NULL DEFAULT 1,
        order_index INTEGER NOT NULL DEFAULT 0,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}projects (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        module_id UUID REFERENCES {p}modules(id) ON DELETE SET NULL,
        title TEXT NOT NULL,
        description TEXT,
        difficulty VARCHAR(50),
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}project_steps (
        id UUID PRIMARY KEY,
        project_id UUID NOT NULL REFERENCES {p}projects(id) ON DELETE CASCADE,
        step_number INTEGER NOT NULL,
        title TEXT NOT NULL,
        instructions TEXT,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}labs (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        module_id UUID REFERENCES {p}modules(id) ON DELETE SET NULL,
        lesson_id UUID REFERENCES {p}lessons(id) ON DELETE SET NULL,
        title TEXT NOT NULL,
        instructions TEXT,
        starter_code TEXT,
        language VARCHAR(50),
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}certificates (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT,
        eligibility JSONB NOT NULL DEFAULT '{}',
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}course_rewards (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        coin_rules JSONB NOT NULL DEFAULT '{}',
        bonus_rules JSONB NOT NULL DEFAULT '{}',
        scholarship_rule JSONB,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}achievement_cards (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        message TEXT,
        icon VARCHAR(100),
        sort_order INTEGER NOT NULL DEFAULT 0,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS {p}motivational_cards (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES {p}courses(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        message TEXT,
        icon VARCHAR(100),
        sort_order INTEGER NOT NULL DEFAULT 0,
        source_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
];

// The draft/live cross references are plain UUID columns without foreign
// keys; deleting one side never touches the other.
const DRAFT_COURSES: &str = "CREATE TABLE IF NOT EXISTS draft_courses (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    level VARCHAR(50),
    category VARCHAR(100),
    thumbnail_url TEXT,
    price_cents BIGINT NOT NULL DEFAULT 0,
    currency VARCHAR(3) NOT NULL DEFAULT 'USD',
    is_free BOOLEAN NOT NULL DEFAULT true,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    live_course_id UUID,
    published_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const LIVE_COURSES: &str = "CREATE TABLE IF NOT EXISTS live_courses (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    level VARCHAR(50),
    category VARCHAR(100),
    thumbnail_url TEXT,
    price_cents BIGINT NOT NULL DEFAULT 0,
    currency VARCHAR(3) NOT NULL DEFAULT 'USD',
    is_free BOOLEAN NOT NULL DEFAULT true,
    status VARCHAR(20) NOT NULL DEFAULT 'published',
    draft_course_id UUID UNIQUE,
    version INTEGER NOT NULL DEFAULT 1,
    published_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

fn prefix(side: Side) -> &'static str {
    match side {
        Side::Draft => "draft_",
        Side::Live => "live_",
    }
}

/// Every DDL statement, roots first
pub fn statements() -> Vec<String> {
    let mut out = vec![DRAFT_COURSES.to_string(), LIVE_COURSES.to_string()];
    for side in [Side::Draft, Side::Live] {
        for ddl in CHILD_TABLES {
            out.push(ddl.replace("{p}", prefix(side)));
        }
    }
    out.push("CREATE INDEX IF NOT EXISTS idx_live_courses_status ON live_courses(status)".to_string());
    out
}

/// Create the course tables if they don't exist
pub async fn create_course_tables(pool: &Pool) -> anyhow::Result<()> {
    let client = pool.get().await?;

    for ddl in statements() {
        client.execute(ddl.as_str(), &[]).await?;
    }

    info!("✅ Course tables initialized");
    Ok(())
}
