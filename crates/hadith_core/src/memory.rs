//! In-memory [`DatabaseService`] implementation for tests. Compiled only for
//! this crate's tests and under the `test-util` feature.
//!
//! Everything lives in `Vec`/`HashMap` behind `std::sync::RwLock`. Semantic
//! matching is brute-force cosine similarity, standing in for the datastore's
//! `match_hadiths` function.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Achievement, AuthSession, Favorite, Hadith, HadithMatch, NewQuizResult, Profile,
    ProfileSummary, ProfileUpdate, Progress, ProgressStatus, ProgressUpdate, QuizResult,
    StatsDelta, User, UserCredentials,
};
use crate::ports::{DatabaseService, PortError, PortResult};

/// In-memory store for tests.
pub struct InMemoryStore {
    hadiths: RwLock<Vec<Hadith>>,
    users: RwLock<Vec<UserCredentials>>,
    sessions: RwLock<HashMap<String, AuthSession>>,
    profiles: RwLock<HashMap<String, Profile>>,
    progress: RwLock<Vec<Progress>>,
    favorites: RwLock<Vec<Favorite>>,
    quiz_results: RwLock<Vec<QuizResult>>,
    achievements: RwLock<Vec<Achievement>>,
    match_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            hadiths: RwLock::new(Vec::new()),
            users: RwLock::new(Vec::new()),
            sessions: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            progress: RwLock::new(Vec::new()),
            favorites: RwLock::new(Vec::new()),
            quiz_results: RwLock::new(Vec::new()),
            achievements: RwLock::new(Vec::new()),
            match_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert_hadith(&self, hadith: Hadith) {
        write(&self.hadiths).push(hadith);
    }

    pub fn insert_achievement(&self, achievement: Achievement) {
        write(&self.achievements).push(achievement);
    }

    /// Number of times the similarity function has been invoked.
    pub fn match_calls(&self) -> usize {
        self.match_calls.load(Ordering::SeqCst)
    }

    pub fn profile_count(&self) -> usize {
        read(&self.profiles).len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a hadith row with the given book and English text.
pub fn sample_hadith(book_name: &str, english_text: &str) -> Hadith {
    let now = Utc::now();
    Hadith {
        id: Uuid::new_v4(),
        book_name: book_name.to_string(),
        hadith_number: "1".to_string(),
        chapter: None,
        narrated_by: "Abu Hurairah".to_string(),
        arabic_text: "حديث".to_string(),
        english_text: english_text.to_string(),
        grade: Some("Sahih".to_string()),
        topics: Vec::new(),
        embedding: None,
        created_at: now,
        updated_at: now,
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

fn hadith_not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Hadith {} not found", id))
}

fn profile_not_found(user_id: &str) -> PortError {
    PortError::NotFound(format!("Profile {} not found", user_id))
}

/// Counters saturate at `i32::MAX`, matching the capped SQL update.
fn credit(profile: &mut Profile, delta: StatsDelta) {
    profile.hadiths_read = profile.hadiths_read.saturating_add(delta.hadiths_read);
    profile.quizzes_completed = profile.quizzes_completed.saturating_add(delta.quizzes_completed);
    profile.points = profile.points.saturating_add(delta.points);
    profile.updated_at = Utc::now();
}

#[async_trait]
impl DatabaseService for InMemoryStore {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut users = write(&self.users);
        if users.iter().any(|u| u.email == email) {
            return Err(PortError::Validation(format!("{} is already registered", email)));
        }
        let user_id = Uuid::new_v4().to_string();
        users.push(UserCredentials {
            user_id: user_id.clone(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        read(&self.users)
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        write(&self.sessions).insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id: user_id.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        match read(&self.sessions).get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id.clone()),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        write(&self.sessions).remove(session_id);
        Ok(())
    }

    async fn get_hadith(&self, hadith_id: Uuid) -> PortResult<Hadith> {
        read(&self.hadiths)
            .iter()
            .find(|h| h.id == hadith_id)
            .cloned()
            .ok_or_else(|| hadith_not_found(hadith_id))
    }

    async fn search_hadiths(&self, query: &str, limit: i64, offset: i64) -> PortResult<Vec<Hadith>> {
        let needle = query.to_lowercase();
        let mut rows: Vec<Hadith> = read(&self.hadiths)
            .iter()
            .filter(|h| {
                [&h.english_text, &h.arabic_text, &h.narrated_by, &h.book_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.book_name
                .cmp(&b.book_name)
                .then_with(|| a.hadith_number.cmp(&b.hadith_number))
        });
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn match_hadiths(
        &self,
        embedding: &[f32],
        threshold: f32,
        count: i64,
    ) -> PortResult<Vec<HadithMatch>> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        let mut hits: Vec<HadithMatch> = read(&self.hadiths)
            .iter()
            .filter_map(|h| {
                let score = cosine_sim(h.embedding.as_deref()?, embedding);
                (score >= threshold).then(|| HadithMatch {
                    hadith: h.clone(),
                    similarity: Some(score),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(count.max(0) as usize);
        Ok(hits)
    }

    async fn set_hadith_embedding(&self, hadith_id: Uuid, embedding: &[f32]) -> PortResult<()> {
        let mut hadiths = write(&self.hadiths);
        let hadith = hadiths
            .iter_mut()
            .find(|h| h.id == hadith_id)
            .ok_or_else(|| hadith_not_found(hadith_id))?;
        hadith.embedding = Some(embedding.to_vec());
        hadith.updated_at = Utc::now();
        Ok(())
    }

    async fn hadiths_with_topics(&self, topics: &[String], limit: i64) -> PortResult<Vec<Hadith>> {
        Ok(read(&self.hadiths)
            .iter()
            .filter(|h| topics.iter().all(|t| h.topics.contains(t)))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_hadith_by_text(&self, query: &str) -> PortResult<Option<Hadith>> {
        let needle = query.to_lowercase();
        Ok(read(&self.hadiths)
            .iter()
            .find(|h| h.english_text.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn recent_hadiths_for_user(&self, user_id: &str, limit: i64) -> PortResult<Vec<Hadith>> {
        let mut rows: Vec<Progress> = read(&self.progress)
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_read.cmp(&a.last_read));
        let hadiths = read(&self.hadiths);
        Ok(rows
            .iter()
            .filter_map(|p| hadiths.iter().find(|h| h.id == p.hadith_id).cloned())
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn ensure_profile(&self, user_id: &str, username: Option<&str>) -> PortResult<Profile> {
        Ok(write(&self.profiles)
            .entry(user_id.to_string())
            .or_insert_with(|| Profile::new(user_id, username.map(str::to_string)))
            .clone())
    }

    async fn get_profile_summary(&self, user_id: &str) -> PortResult<ProfileSummary> {
        let profile = read(&self.profiles)
            .get(user_id)
            .cloned()
            .ok_or_else(|| profile_not_found(user_id))?;
        let owned = |uid: &str| uid == user_id;
        Ok(ProfileSummary {
            profile,
            progress_count: read(&self.progress).iter().filter(|p| owned(&p.user_id)).count() as i64,
            favorites_count: read(&self.favorites).iter().filter(|f| owned(&f.user_id)).count() as i64,
            quiz_results_count: read(&self.quiz_results)
                .iter()
                .filter(|q| owned(&q.user_id))
                .count() as i64,
            achievements_count: read(&self.achievements)
                .iter()
                .filter(|a| owned(&a.user_id))
                .count() as i64,
        })
    }

    async fn upsert_profile(&self, user_id: &str, username: Option<&str>) -> PortResult<Profile> {
        let mut profiles = write(&self.profiles);
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| Profile::new(user_id, None));
        if let Some(name) = username {
            profile.username = Some(name.to_string());
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> PortResult<Profile> {
        let mut profiles = write(&self.profiles);
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| profile_not_found(user_id))?;
        if let Some(name) = &update.username {
            profile.username = Some(name.clone());
        }
        if let Some(points) = update.points {
            profile.points = points;
        }
        if let Some(streak) = update.streak {
            profile.current_streak = streak;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn apply_stats(&self, user_id: &str, delta: StatsDelta) -> PortResult<Profile> {
        let mut profiles = write(&self.profiles);
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| profile_not_found(user_id))?;
        credit(profile, delta);
        Ok(profile.clone())
    }

    async fn delete_profile(&self, user_id: &str) -> PortResult<()> {
        if write(&self.profiles).remove(user_id).is_none() {
            return Err(profile_not_found(user_id));
        }
        write(&self.progress).retain(|p| p.user_id != user_id);
        write(&self.favorites).retain(|f| f.user_id != user_id);
        write(&self.quiz_results).retain(|q| q.user_id != user_id);
        write(&self.achievements).retain(|a| a.user_id != user_id);
        Ok(())
    }

    async fn record_progress(
        &self,
        user_id: &str,
        hadith_id: Uuid,
        status: ProgressStatus,
    ) -> PortResult<ProgressUpdate> {
        self.get_hadith(hadith_id).await?;
        let now = Utc::now();
        let mut rows = write(&self.progress);
        if let Some(row) = rows
            .iter_mut()
            .find(|p| p.user_id == user_id && p.hadith_id == hadith_id)
        {
            let previous_status = Some(row.status);
            row.status = status;
            row.last_read = now;
            return Ok(ProgressUpdate {
                progress: row.clone(),
                previous_status,
            });
        }
        let progress = Progress {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            hadith_id,
            status,
            last_read: now,
            created_at: now,
        };
        rows.push(progress.clone());
        Ok(ProgressUpdate {
            progress,
            previous_status: None,
        })
    }

    async fn add_favorite(&self, user_id: &str, hadith_id: Uuid) -> PortResult<Favorite> {
        self.get_hadith(hadith_id).await?;
        let mut favorites = write(&self.favorites);
        if let Some(existing) = favorites
            .iter()
            .find(|f| f.user_id == user_id && f.hadith_id == hadith_id)
        {
            return Ok(existing.clone());
        }
        let favorite = Favorite {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            hadith_id,
            created_at: Utc::now(),
        };
        favorites.push(favorite.clone());
        Ok(favorite)
    }

    async fn remove_favorite(&self, user_id: &str, hadith_id: Uuid) -> PortResult<()> {
        let mut favorites = write(&self.favorites);
        let before = favorites.len();
        favorites.retain(|f| !(f.user_id == user_id && f.hadith_id == hadith_id));
        if favorites.len() == before {
            return Err(PortError::NotFound(format!(
                "Favorite {} not found",
                hadith_id
            )));
        }
        Ok(())
    }

    async fn favorite_hadiths(&self, user_id: &str) -> PortResult<Vec<Hadith>> {
        let favorites = read(&self.favorites);
        let hadiths = read(&self.hadiths);
        Ok(favorites
            .iter()
            .rev()
            .filter(|f| f.user_id == user_id)
            .filter_map(|f| hadiths.iter().find(|h| h.id == f.hadith_id).cloned())
            .collect())
    }

    async fn save_quiz_result(&self, user_id: &str, result: NewQuizResult) -> PortResult<QuizResult> {
        let mut profiles = write(&self.profiles);
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| profile_not_found(user_id))?;
        let stored = QuizResult {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            quiz_id: result.quiz_id,
            hadith_id: result.hadith_id,
            score: result.score,
            time_spent: result.time_spent,
            answers: result.answers,
            completed_at: Utc::now(),
        };
        credit(
            profile,
            StatsDelta {
                quizzes_completed: 1,
                points: stored.score,
                ..StatsDelta::default()
            },
        );
        write(&self.quiz_results).push(stored.clone());
        Ok(stored)
    }

    async fn list_achievements(&self, user_id: &str) -> PortResult<Vec<Achievement>> {
        Ok(read(&self.achievements)
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}
