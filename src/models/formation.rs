use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::quiz::QuizDetail;
use super::user::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "BEGINNER",
            Level::Intermediate => "INTERMEDIATE",
            Level::Advanced => "ADVANCED",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEGINNER" => Ok(Level::Beginner),
            "INTERMEDIATE" => Ok(Level::Intermediate),
            "ADVANCED" => Ok(Level::Advanced),
            other => Err(format!("unknown level: {}", other)),
        }
    }
}

/// A purchasable course
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Formation {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub level: Level,
    pub target_role: Role,
    pub is_published: bool,
    pub duration_minutes: Option<i32>,
    pub price: Option<f64>,
    pub currency: String,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFormation {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub level: Level,
    pub target_role: Role,
    pub is_published: bool,
    pub duration_minutes: Option<i32>,
    pub price: Option<f64>,
    pub currency: String,
    pub thumbnail_url: Option<String>,
}

/// Partial update. On nullable columns `None` keeps the value and
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct FormationUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub level: Option<Level>,
    pub target_role: Option<Role>,
    pub is_published: Option<bool>,
    pub duration_minutes: Option<Option<i32>>,
    pub price: Option<Option<f64>>,
    pub currency: Option<String>,
    pub thumbnail_url: Option<Option<String>>,
}

/// A section of a formation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: Uuid,
    pub formation_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewModule {
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub duration_minutes: Option<Option<i32>>,
}

/// A video-backed learning unit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_id: Option<String>,
    pub duration_seconds: i32,
    pub is_preview: bool,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLesson {
    pub title: String,
    pub description: Option<String>,
    pub video_id: Option<String>,
    pub duration_seconds: i32,
    pub is_preview: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub video_id: Option<Option<String>>,
    pub duration_seconds: Option<i32>,
    pub is_preview: Option<bool>,
}

/// A module with its ordered lessons and optional quiz
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetail {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
    pub quiz: Option<QuizDetail>,
}

/// A formation with the whole content tree below it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationDetail {
    #[serde(flatten)]
    pub formation: Formation,
    pub modules: Vec<ModuleDetail>,
}
