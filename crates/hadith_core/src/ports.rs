//! crates/hadith_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete datastore and the AI vendor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    Achievement, ChatMessage, Favorite, Hadith, HadithMatch, NewQuizResult, Profile,
    ProfileSummary, ProfileUpdate, ProgressStatus, ProgressUpdate, QuizResult, StatsDelta, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    /// The AI vendor answered, but not with the JSON shape that was asked for.
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Text fragments of a streamed completion, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user id of a live (unexpired) session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Hadiths ---
    async fn get_hadith(&self, hadith_id: Uuid) -> PortResult<Hadith>;

    /// Case-insensitive substring match over text, narrator and book, ordered by book.
    async fn search_hadiths(&self, query: &str, limit: i64, offset: i64)
        -> PortResult<Vec<Hadith>>;

    /// Delegates ranking to the datastore's `match_hadiths` function.
    async fn match_hadiths(
        &self,
        embedding: &[f32],
        threshold: f32,
        count: i64,
    ) -> PortResult<Vec<HadithMatch>>;

    async fn set_hadith_embedding(&self, hadith_id: Uuid, embedding: &[f32]) -> PortResult<()>;

    /// Hadiths tagged with every one of `topics`.
    async fn hadiths_with_topics(&self, topics: &[String], limit: i64) -> PortResult<Vec<Hadith>>;

    /// The first hadith whose English text contains `query`, if any.
    async fn find_hadith_by_text(&self, query: &str) -> PortResult<Option<Hadith>>;

    /// Hadiths from the user's progress rows, most recently read first.
    async fn recent_hadiths_for_user(&self, user_id: &str, limit: i64) -> PortResult<Vec<Hadith>>;

    // --- Profiles ---
    /// Creates a zero-initialized profile if none exists, then reads it back.
    async fn ensure_profile(&self, user_id: &str, username: Option<&str>) -> PortResult<Profile>;

    async fn get_profile_summary(&self, user_id: &str) -> PortResult<ProfileSummary>;

    async fn upsert_profile(&self, user_id: &str, username: Option<&str>) -> PortResult<Profile>;

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> PortResult<Profile>;

    async fn apply_stats(&self, user_id: &str, delta: StatsDelta) -> PortResult<Profile>;

    async fn delete_profile(&self, user_id: &str) -> PortResult<()>;

    // --- Progress, Favorites, Quizzes, Achievements ---
    async fn record_progress(
        &self,
        user_id: &str,
        hadith_id: Uuid,
        status: ProgressStatus,
    ) -> PortResult<ProgressUpdate>;

    async fn add_favorite(&self, user_id: &str, hadith_id: Uuid) -> PortResult<Favorite>;

    async fn remove_favorite(&self, user_id: &str, hadith_id: Uuid) -> PortResult<()>;

    async fn favorite_hadiths(&self, user_id: &str) -> PortResult<Vec<Hadith>>;

    /// Stores the result and credits the profile with one quiz and `score`
    /// points. Either both happen or neither does.
    async fn save_quiz_result(&self, user_id: &str, result: NewQuizResult)
        -> PortResult<QuizResult>;

    async fn list_achievements(&self, user_id: &str) -> PortResult<Vec<Achievement>>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns the fixed-length embedding vector for `text`.
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>>;
}

/// A single chat-completion call: system preamble, prior turns, then the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<ChatMessage>,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            prompt: prompt.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the full text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> PortResult<String>;

    /// Streams the reply as text fragments as they arrive.
    async fn complete_streaming(&self, request: CompletionRequest) -> PortResult<TextStream>;
}
