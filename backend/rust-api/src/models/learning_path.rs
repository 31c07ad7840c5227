use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Difficulty tier assigned by the AI when generating a path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Lifecycle status of a learning path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathStatus {
    Generating,
    Active,
    Completed,
    Failed,
}

impl PathStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PathStatus::Generating => "generating",
            PathStatus::Active => "active",
            PathStatus::Completed => "completed",
            PathStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Video,
    Article,
    Documentation,
    Course,
    Tutorial,
}

/// External learning resource attached to a lesson
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

/// Multiple-choice quiz question (4 options, one correct index)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
}

// ============================================================================
// Domain tree (what the API returns and the progress core consumes).
// Field names are camelCase over the wire to match the frontend contract.
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub questions: Vec<Question>,
    pub passing_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub order_index: u32,
    pub title: String,
    pub content: String,
    pub learning_objectives: Vec<String>,
    pub resources: Vec<Resource>,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub order_index: u32,
    pub title: String,
    pub description: String,
    pub estimated_duration_hours: f64,
    pub is_completed: bool,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub goal: String,
    pub difficulty: DifficultyLevel,
    pub estimated_duration_hours: f64,
    pub status: PathStatus,
    pub modules: Vec<Module>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Mongo documents (one collection per entity, mirroring the relational
// schema: learning_paths, modules, lessons, quizzes). String UUID _id.
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPathDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub goal: String,
    pub difficulty_level: DifficultyLevel,
    pub estimated_duration_hours: f64,
    pub status: PathStatus,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub learning_path_id: String,
    pub order_index: u32,
    pub title: String,
    pub description: String,
    pub estimated_duration_hours: f64,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub module_id: String,
    pub order_index: u32,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(
        rename = "completedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub lesson_id: String,
    pub questions: Vec<Question>,
    pub passing_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_score: Option<u32>,
    #[serde(
        rename = "completedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl QuizDoc {
    pub fn into_domain(self) -> Quiz {
        Quiz {
            id: self.id,
            questions: self.questions,
            passing_score: self.passing_score,
            user_score: self.user_score,
            completed_at: self.completed_at,
        }
    }
}

impl LessonDoc {
    pub fn into_domain(self, quiz: Option<Quiz>) -> Lesson {
        Lesson {
            id: self.id,
            order_index: self.order_index,
            title: self.title,
            content: self.content,
            learning_objectives: self.learning_objectives,
            resources: self.resources,
            is_completed: self.is_completed,
            completed_at: self.completed_at,
            quiz,
        }
    }
}

impl ModuleDoc {
    pub fn into_domain(self, lessons: Vec<Lesson>) -> Module {
        Module {
            id: self.id,
            order_index: self.order_index,
            title: self.title,
            description: self.description,
            estimated_duration_hours: self.estimated_duration_hours,
            is_completed: self.is_completed,
            lessons,
        }
    }
}

impl LearningPathDoc {
    pub fn into_domain(self, modules: Vec<Module>) -> LearningPath {
        LearningPath {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            goal: self.goal,
            difficulty: self.difficulty_level,
            estimated_duration_hours: self.estimated_duration_hours,
            status: self.status,
            modules,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ============================================================================
// AI generation payloads (what Gemini returns before persistence)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGeneratedQuiz {
    pub questions: Vec<Question>,
    pub passing_score: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGeneratedLesson {
    pub title: String,
    pub content: String,
    pub objectives: Vec<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    pub quiz: AiGeneratedQuiz,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGeneratedModule {
    pub title: String,
    pub description: String,
    pub estimated_hours: f64,
    pub lessons: Vec<AiGeneratedLesson>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGeneratedPath {
    pub title: String,
    pub description: String,
    pub difficulty: DifficultyLevel,
    pub estimated_hours: f64,
    pub modules: Vec<AiGeneratedModule>,
}

// ============================================================================
// Request / response DTOs
// ============================================================================

/// Request to generate a new learning path
#[derive(Debug, Deserialize, Validate)]
pub struct GeneratePathRequest {
    #[validate(length(min = 1, max = 500, message = "Learning goal is required"))]
    pub goal: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePathResponse {
    pub success: bool,
    pub path_id: String,
    pub title: String,
}

/// Request to submit a quiz score (percentage 0-100)
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizScoreRequest {
    #[validate(range(min = 0, max = 100, message = "Score must be between 0 and 100"))]
    pub score: u32,
}
