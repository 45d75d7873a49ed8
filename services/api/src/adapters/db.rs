//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Embeddings cross the wire as `real[]` and are cast to and from the `vector`
//! column type inside each statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hadith_core::domain::{
    Achievement, Favorite, Hadith, HadithMatch, NewQuizResult, Profile, ProfileSummary,
    ProfileUpdate, Progress, ProgressStatus, ProgressUpdate, QuizResult, StatsDelta, User,
    UserCredentials,
};
use hadith_core::ports::{DatabaseService, PortError, PortResult};
use hadith_core::search::like_pattern;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

const HADITH_COLUMNS: &str = "h.id, h.book_name, h.hadith_number, h.chapter, h.narrated_by, \
     h.arabic_text, h.english_text, h.grade, h.topics, h.embedding::real[] AS embedding, \
     h.created_at, h.updated_at";

const PROFILE_COLUMNS: &str =
    "id, username, hadiths_read, quizzes_completed, current_streak, points, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn db_error_code(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c.into_owned())
}

/// Maps a write failure, turning a missing referenced hadith into `NotFound`.
fn hadith_write_error(e: sqlx::Error, hadith_id: Uuid) -> PortError {
    match db_error_code(&e).as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => PortError::NotFound(format!("Hadith {} not found", hadith_id)),
        _ => unexpected(e),
    }
}

fn profile_not_found(user_id: &str) -> PortError {
    PortError::NotFound(format!("Profile {} not found", user_id))
}

/// Adds `$2..$4` to the counters of profile `$1`; each counter saturates at
/// the INTEGER maximum.
fn apply_stats_sql() -> String {
    format!(
        "UPDATE profiles
            SET hadiths_read = LEAST(hadiths_read::bigint + $2, 2147483647)::int,
                quizzes_completed = LEAST(quizzes_completed::bigint + $3, 2147483647)::int,
                points = LEAST(points::bigint + $4, 2147483647)::int,
                updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        PROFILE_COLUMNS
    )
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: String,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct HadithRecord {
    id: Uuid,
    book_name: String,
    hadith_number: String,
    chapter: Option<String>,
    narrated_by: String,
    arabic_text: String,
    english_text: String,
    grade: Option<String>,
    topics: Vec<String>,
    embedding: Option<Vec<f32>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl HadithRecord {
    fn to_domain(self) -> Hadith {
        Hadith {
            id: self.id,
            book_name: self.book_name,
            hadith_number: self.hadith_number,
            chapter: self.chapter,
            narrated_by: self.narrated_by,
            arabic_text: self.arabic_text,
            english_text: self.english_text,
            grade: self.grade,
            topics: self.topics,
            embedding: self.embedding,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct HadithMatchRecord {
    #[sqlx(flatten)]
    hadith: HadithRecord,
    similarity: f32,
}

#[derive(FromRow)]
struct ProfileRecord {
    id: String,
    username: Option<String>,
    hadiths_read: i32,
    quizzes_completed: i32,
    current_streak: i32,
    points: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            username: self.username,
            hadiths_read: self.hadiths_read,
            quizzes_completed: self.quizzes_completed,
            current_streak: self.current_streak,
            points: self.points,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileSummaryRecord {
    #[sqlx(flatten)]
    profile: ProfileRecord,
    progress_count: i64,
    favorites_count: i64,
    quiz_results_count: i64,
    achievements_count: i64,
}

#[derive(FromRow)]
struct ProgressRecord {
    id: Uuid,
    user_id: String,
    hadith_id: Uuid,
    status: String,
    last_read: DateTime<Utc>,
    created_at: DateTime<Utc>,
    previous_status: Option<String>,
}
impl ProgressRecord {
    fn to_domain(self) -> PortResult<ProgressUpdate> {
        let parse = |s: &str| s.parse::<ProgressStatus>().map_err(PortError::Unexpected);
        Ok(ProgressUpdate {
            previous_status: self.previous_status.as_deref().map(parse).transpose()?,
            progress: Progress {
                id: self.id,
                user_id: self.user_id,
                hadith_id: self.hadith_id,
                status: parse(&self.status)?,
                last_read: self.last_read,
                created_at: self.created_at,
            },
        })
    }
}

#[derive(FromRow)]
struct FavoriteRecord {
    id: Uuid,
    user_id: String,
    hadith_id: Uuid,
    created_at: DateTime<Utc>,
}
impl FavoriteRecord {
    fn to_domain(self) -> Favorite {
        Favorite {
            id: self.id,
            user_id: self.user_id,
            hadith_id: self.hadith_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizResultRecord {
    id: Uuid,
    user_id: String,
    quiz_id: Option<Uuid>,
    hadith_id: Option<Uuid>,
    score: i32,
    time_spent: i32,
    answers: serde_json::Value,
    completed_at: DateTime<Utc>,
}
impl QuizResultRecord {
    fn to_domain(self) -> QuizResult {
        QuizResult {
            id: self.id,
            user_id: self.user_id,
            quiz_id: self.quiz_id,
            hadith_id: self.hadith_id,
            score: self.score,
            time_spent: self.time_spent,
            answers: self.answers,
            completed_at: self.completed_at,
        }
    }
}

#[derive(FromRow)]
struct AchievementRecord {
    id: Uuid,
    user_id: String,
    kind: String,
    name: String,
    description: String,
    earned_at: DateTime<Utc>,
}
impl AchievementRecord {
    fn to_domain(self) -> Achievement {
        Achievement {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind,
            name: self.name,
            description: self.description,
            earned_at: self.earned_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let user_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, email, hashed_password) VALUES ($1, $2, $3)")
            .bind(&user_id)
            .bind(email)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(|e| match db_error_code(&e).as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    PortError::Validation(format!("{} is already registered", email))
                }
                _ => unexpected(e),
            })?;
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;

        Ok(UserCredentials {
            user_id: record.id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_hadith(&self, hadith_id: Uuid) -> PortResult<Hadith> {
        let sql = format!("SELECT {} FROM hadiths h WHERE h.id = $1", HADITH_COLUMNS);
        let record = sqlx::query_as::<_, HadithRecord>(&sql)
            .bind(hadith_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Hadith {} not found", hadith_id)))?;
        Ok(record.to_domain())
    }

    async fn search_hadiths(&self, query: &str, limit: i64, offset: i64) -> PortResult<Vec<Hadith>> {
        let sql = format!(
            r"SELECT {} FROM hadiths h
              WHERE h.english_text ILIKE $1 ESCAPE '\'
                 OR h.arabic_text ILIKE $1 ESCAPE '\'
                 OR h.narrated_by ILIKE $1 ESCAPE '\'
                 OR h.book_name ILIKE $1 ESCAPE '\'
              ORDER BY h.book_name ASC, h.hadith_number ASC
              LIMIT $2 OFFSET $3",
            HADITH_COLUMNS
        );
        let records = sqlx::query_as::<_, HadithRecord>(&sql)
            .bind(like_pattern(query))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn match_hadiths(
        &self,
        embedding: &[f32],
        threshold: f32,
        count: i64,
    ) -> PortResult<Vec<HadithMatch>> {
        let sql = format!(
            "SELECT {}, m.similarity::real AS similarity
             FROM match_hadiths($1::real[]::vector, $2::float8, $3::int) m
             JOIN hadiths h ON h.id = m.id
             ORDER BY m.similarity DESC",
            HADITH_COLUMNS
        );
        let records = sqlx::query_as::<_, HadithMatchRecord>(&sql)
            .bind(embedding)
            .bind(threshold)
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(|r| HadithMatch {
                hadith: r.hadith.to_domain(),
                similarity: Some(r.similarity),
            })
            .collect())
    }

    async fn set_hadith_embedding(&self, hadith_id: Uuid, embedding: &[f32]) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE hadiths SET embedding = $1::real[]::vector, updated_at = NOW() WHERE id = $2",
        )
        .bind(embedding)
        .bind(hadith_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Hadith {} not found", hadith_id)));
        }
        Ok(())
    }

    async fn hadiths_with_topics(&self, topics: &[String], limit: i64) -> PortResult<Vec<Hadith>> {
        let sql = format!(
            "SELECT {} FROM hadiths h WHERE h.topics @> $1 ORDER BY h.book_name LIMIT $2",
            HADITH_COLUMNS
        );
        let records = sqlx::query_as::<_, HadithRecord>(&sql)
            .bind(topics)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_hadith_by_text(&self, query: &str) -> PortResult<Option<Hadith>> {
        let sql = format!(
            r"SELECT {} FROM hadiths h WHERE h.english_text ILIKE $1 ESCAPE '\' LIMIT 1",
            HADITH_COLUMNS
        );
        let record = sqlx::query_as::<_, HadithRecord>(&sql)
            .bind(like_pattern(query))
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn recent_hadiths_for_user(&self, user_id: &str, limit: i64) -> PortResult<Vec<Hadith>> {
        let sql = format!(
            "SELECT {} FROM progress p
             JOIN hadiths h ON h.id = p.hadith_id
             WHERE p.user_id = $1
             ORDER BY p.last_read DESC
             LIMIT $2",
            HADITH_COLUMNS
        );
        let records = sqlx::query_as::<_, HadithRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn ensure_profile(&self, user_id: &str, username: Option<&str>) -> PortResult<Profile> {
        sqlx::query("INSERT INTO profiles (id, username) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| profile_not_found(user_id))?;
        Ok(record.to_domain())
    }

    async fn get_profile_summary(&self, user_id: &str) -> PortResult<ProfileSummary> {
        let record = sqlx::query_as::<_, ProfileSummaryRecord>(
            "SELECT p.id, p.username, p.hadiths_read, p.quizzes_completed, p.current_streak,
                    p.points, p.created_at, p.updated_at,
                    (SELECT COUNT(*) FROM progress WHERE user_id = p.id) AS progress_count,
                    (SELECT COUNT(*) FROM favorites WHERE user_id = p.id) AS favorites_count,
                    (SELECT COUNT(*) FROM quiz_results WHERE user_id = p.id) AS quiz_results_count,
                    (SELECT COUNT(*) FROM achievements WHERE user_id = p.id) AS achievements_count
             FROM profiles p
             WHERE p.id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| profile_not_found(user_id))?;

        Ok(ProfileSummary {
            profile: record.profile.to_domain(),
            progress_count: record.progress_count,
            favorites_count: record.favorites_count,
            quiz_results_count: record.quiz_results_count,
            achievements_count: record.achievements_count,
        })
    }

    async fn upsert_profile(&self, user_id: &str, username: Option<&str>) -> PortResult<Profile> {
        let sql = format!(
            "INSERT INTO profiles (id, username) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE
                SET username = COALESCE(EXCLUDED.username, profiles.username),
                    updated_at = NOW()
             RETURNING {}",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> PortResult<Profile> {
        let sql = format!(
            "UPDATE profiles
                SET username = COALESCE($2, username),
                    points = COALESCE($3, points),
                    current_streak = COALESCE($4, current_streak),
                    updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            PROFILE_COLUMNS
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(user_id)
            .bind(update.username.as_deref())
            .bind(update.points)
            .bind(update.streak)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| profile_not_found(user_id))?;
        Ok(record.to_domain())
    }

    async fn apply_stats(&self, user_id: &str, delta: StatsDelta) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&apply_stats_sql())
            .bind(user_id)
            .bind(delta.hadiths_read)
            .bind(delta.quizzes_completed)
            .bind(delta.points)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| profile_not_found(user_id))?;
        Ok(record.to_domain())
    }

    async fn delete_profile(&self, user_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(profile_not_found(user_id));
        }
        Ok(())
    }

    async fn record_progress(
        &self,
        user_id: &str,
        hadith_id: Uuid,
        status: ProgressStatus,
    ) -> PortResult<ProgressUpdate> {
        // The CTE reads the row as it was before this statement's write.
        let record = sqlx::query_as::<_, ProgressRecord>(
            "WITH prev AS (
                SELECT status FROM progress WHERE user_id = $1 AND hadith_id = $2
             )
             INSERT INTO progress (user_id, hadith_id, status, last_read)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (user_id, hadith_id) DO UPDATE
                SET status = EXCLUDED.status, last_read = NOW()
             RETURNING id, user_id, hadith_id, status, last_read, created_at,
                       (SELECT status FROM prev) AS previous_status",
        )
        .bind(user_id)
        .bind(hadith_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| hadith_write_error(e, hadith_id))?;
        record.to_domain()
    }

    async fn add_favorite(&self, user_id: &str, hadith_id: Uuid) -> PortResult<Favorite> {
        sqlx::query(
            "INSERT INTO favorites (user_id, hadith_id) VALUES ($1, $2)
             ON CONFLICT (user_id, hadith_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(hadith_id)
        .execute(&self.pool)
        .await
        .map_err(|e| hadith_write_error(e, hadith_id))?;

        let record = sqlx::query_as::<_, FavoriteRecord>(
            "SELECT id, user_id, hadith_id, created_at FROM favorites
             WHERE user_id = $1 AND hadith_id = $2",
        )
        .bind(user_id)
        .bind(hadith_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn remove_favorite(&self, user_id: &str, hadith_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND hadith_id = $2")
            .bind(user_id)
            .bind(hadith_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Favorite {} not found", hadith_id)));
        }
        Ok(())
    }

    async fn favorite_hadiths(&self, user_id: &str) -> PortResult<Vec<Hadith>> {
        let sql = format!(
            "SELECT {} FROM favorites f
             JOIN hadiths h ON h.id = f.hadith_id
             WHERE f.user_id = $1
             ORDER BY f.created_at DESC",
            HADITH_COLUMNS
        );
        let records = sqlx::query_as::<_, HadithRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_quiz_result(&self, user_id: &str, result: NewQuizResult) -> PortResult<QuizResult> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, QuizResultRecord>(
            "INSERT INTO quiz_results (user_id, quiz_id, hadith_id, score, time_spent, answers)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, user_id, quiz_id, hadith_id, score, time_spent, answers, completed_at",
        )
        .bind(user_id)
        .bind(result.quiz_id)
        .bind(result.hadith_id)
        .bind(result.score)
        .bind(result.time_spent)
        .bind(&result.answers)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query_as::<_, ProfileRecord>(&apply_stats_sql())
            .bind(user_id)
            .bind(0_i32)
            .bind(1_i32)
            .bind(record.score)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| profile_not_found(user_id))?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_achievements(&self, user_id: &str) -> PortResult<Vec<Achievement>> {
        let records = sqlx::query_as::<_, AchievementRecord>(
            "SELECT id, user_id, kind, name, description, earned_at FROM achievements
             WHERE user_id = $1 ORDER BY earned_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
