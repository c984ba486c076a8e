//! Course roots for the draft and live aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status shared by draft and live courses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Generating,
    Published,
    Unpublished,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Generating => "generating",
            CourseStatus::Published => "published",
            CourseStatus::Unpublished => "unpublished",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CourseStatus::Draft),
            "generating" => Ok(CourseStatus::Generating),
            "published" => Ok(CourseStatus::Published),
            "unpublished" => Ok(CourseStatus::Unpublished),
            other => Err(format!("Unknown course status '{}'", other)),
        }
    }
}

/// Scalar course metadata copied verbatim from draft to live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetails {
    pub name: String,
    pub description: Option<String>,
    pub level: Option<String>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub is_free: bool,
}

impl Default for CourseDetails {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            level: None,
            category: None,
            thumbnail_url: None,
            price_cents: 0,
            currency: "USD".to_string(),
            is_free: true,
        }
    }
}

/// Editable course in the draft area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftCourse {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: CourseDetails,
    pub status: CourseStatus,
    /// Weak pointer to the live counterpart, lookup only
    pub live_course_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftCourse {
    #[allow(dead_code)]
    pub fn new(details: CourseDetails) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            details,
            status: CourseStatus::Draft,
            live_course_id: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Published course read by external consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveCourse {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: CourseDetails,
    pub status: CourseStatus,
    /// Weak back-reference to the draft origin, lookup only
    pub draft_course_id: Option<Uuid>,
    pub version: i32,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LiveCourse {
    /// First materialization of a draft course
    pub fn from_draft(draft: &DraftCourse, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            details: draft.details.clone(),
            status: CourseStatus::Published,
            draft_course_id: Some(draft.id),
            version: 1,
            published_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Republish over an existing live course, keeping its identifier
    pub fn refresh_from(&mut self, draft: &DraftCourse, now: DateTime<Utc>) {
        self.details = draft.details.clone();
        self.status = CourseStatus::Published;
        self.draft_course_id = Some(draft.id);
        self.version += 1;
        self.published_at = now;
        self.updated_at = now;
    }
}
