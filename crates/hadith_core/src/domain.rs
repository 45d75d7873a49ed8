//! crates/hadith_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Rows are owned by the datastore; these structs are what the ports hand back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

/// Points awarded the first time a hadith is marked as completed.
pub const POINTS_PER_HADITH: i32 = 10;
/// Upper bound on a single quiz score.
pub const MAX_QUIZ_SCORE: i32 = 1_000;
/// Upper bound on the reported quiz duration, one day in seconds.
pub const MAX_QUIZ_SECONDS: i32 = 86_400;

//=========================================================================================
// Hadiths
//=========================================================================================

/// A single hadith as stored in the `hadiths` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Hadith {
    pub id: Uuid,
    pub book_name: String,
    pub hadith_number: String,
    pub chapter: Option<String>,
    pub narrated_by: String,
    pub arabic_text: String,
    pub english_text: String,
    pub grade: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Precomputed embedding, only present once backfilled. Never sent to clients.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A search hit. `similarity` is only set for semantic searches.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HadithMatch {
    #[serde(flatten)]
    pub hadith: Hadith,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl From<Hadith> for HadithMatch {
    fn from(hadith: Hadith) -> Self {
        Self {
            hadith,
            similarity: None,
        }
    }
}

//=========================================================================================
// Users, Sessions and Profiles
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: String,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Per-user learning counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: String,
    pub username: Option<String>,
    pub hadiths_read: i32,
    pub quizzes_completed: i32,
    pub current_streak: i32,
    pub points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A zero-initialized profile for a user seen for the first time.
    pub fn new(id: impl Into<String>, username: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            username,
            hadiths_read: 0,
            quizzes_completed: 0,
            current_streak: 0,
            points: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A profile together with the number of related rows the user owns.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProfileSummary {
    #[serde(flatten)]
    pub profile: Profile,
    pub progress_count: i64,
    pub favorites_count: i64,
    pub quiz_results_count: i64,
    pub achievements_count: i64,
}

/// Fields a user may change on their own profile. `None` leaves the column as is.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub points: Option<i32>,
    pub streak: Option<i32>,
}

/// Increments applied to the profile counters after an activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub hadiths_read: i32,
    pub quizzes_completed: i32,
    pub points: i32,
}

//=========================================================================================
// Progress, Favorites, Quiz Results, Achievements
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            other => Err(format!("unknown progress status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Progress {
    pub id: Uuid,
    pub user_id: String,
    pub hadith_id: Uuid,
    pub status: ProgressStatus,
    pub last_read: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The outcome of recording progress: the stored row and the status it replaced.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub progress: Progress,
    pub previous_status: Option<ProgressStatus>,
}

impl ProgressUpdate {
    /// True when this write moved the hadith into `completed` for the first time.
    pub fn newly_completed(&self) -> bool {
        self.progress.status == ProgressStatus::Completed
            && self.previous_status != Some(ProgressStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: String,
    pub hadith_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A finished quiz as submitted by the client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewQuizResult {
    pub quiz_id: Option<Uuid>,
    pub hadith_id: Option<Uuid>,
    pub score: i32,
    pub time_spent: i32,
    #[schema(value_type = Object)]
    pub answers: serde_json::Value,
}

impl NewQuizResult {
    /// Checks `score` and `time_spent` against their allowed ranges.
    pub fn validate(&self) -> PortResult<()> {
        if !(0..=MAX_QUIZ_SCORE).contains(&self.score) {
            return Err(PortError::Validation(format!(
                "score must be between 0 and {}",
                MAX_QUIZ_SCORE
            )));
        }
        if !(0..=MAX_QUIZ_SECONDS).contains(&self.time_spent) {
            return Err(PortError::Validation(format!(
                "timeSpent must be between 0 and {}",
                MAX_QUIZ_SECONDS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QuizResult {
    pub id: Uuid,
    pub user_id: String,
    pub quiz_id: Option<Uuid>,
    pub hadith_id: Option<Uuid>,
    pub score: i32,
    pub time_spent: i32,
    #[schema(value_type = Object)]
    pub answers: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Achievement {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub earned_at: DateTime<Utc>,
}

//=========================================================================================
// AI Gateway Values
//=========================================================================================

/// One multiple-choice question generated from a hadith.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyChallenge {
    pub question: String,
    pub hint: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A prior turn of the live chat, replayed to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The compact hadith shape the chat UI keeps between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatHadith {
    pub text: String,
    pub book: String,
    pub narrator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

impl From<&Hadith> for ChatHadith {
    fn from(hadith: &Hadith) -> Self {
        Self {
            text: hadith.english_text.clone(),
            book: hadith.book_name.clone(),
            narrator: hadith.narrated_by.clone(),
            chapter: hadith.chapter.clone(),
        }
    }
}
