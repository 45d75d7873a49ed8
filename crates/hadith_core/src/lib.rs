pub mod ai;
pub mod domain;
pub mod guard;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod ports;
pub mod search;

pub use ai::AiGateway;
pub use domain::{
    Achievement, AuthSession, ChatHadith, ChatMessage, ChatRole, DailyChallenge, Difficulty,
    Favorite, Hadith, HadithMatch, NewQuizResult, Profile, ProfileSummary, ProfileUpdate,
    Progress, ProgressStatus, ProgressUpdate, QuizQuestion, QuizResult, StatsDelta, User,
    UserCredentials,
};
pub use guard::{GuardConfig, GuardDecision};
pub use ports::{
    CompletionRequest, CompletionService, DatabaseService, EmbeddingService, PortError,
    PortResult, TextStream,
};
pub use search::{SearchMode, SearchQuery, SearchResolver};
