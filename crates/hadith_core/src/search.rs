//! crates/hadith_core/src/search.rs
//!
//! Resolves a hadith search into either a substring query or a call to the
//! datastore's similarity function. Ranking for semantic search happens in the
//! datastore; nothing here computes similarity.

use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::domain::HadithMatch;
use crate::ports::{DatabaseService, EmbeddingService, PortError, PortResult};

/// Minimum similarity passed to `match_hadiths`.
pub const MATCH_THRESHOLD: f32 = 0.7;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Keyword,
    Semantic,
}

impl FromStr for SearchMode {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "keyword" => Ok(SearchMode::Keyword),
            "semantic" => Ok(SearchMode::Semantic),
            other => Err(PortError::Validation(format!(
                "Unknown search type '{}', expected 'text' or 'semantic'",
                other
            ))),
        }
    }
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub mode: SearchMode,
    pub limit: i64,
    pub page: i64,
}

impl SearchQuery {
    pub fn new(
        text: impl Into<String>,
        mode: SearchMode,
        limit: Option<i64>,
        page: Option<i64>,
    ) -> PortResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PortError::Validation("Search query is required".to_string()));
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit < 1 {
            return Err(PortError::Validation("limit must be at least 1".to_string()));
        }
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(PortError::Validation("page must be at least 1".to_string()));
        }
        let limit = limit.min(MAX_LIMIT);
        if (page - 1).checked_mul(limit).is_none() {
            return Err(PortError::Validation("page is out of range".to_string()));
        }
        Ok(Self {
            text,
            mode,
            limit,
            page,
        })
    }

    /// Row offset of the first result on this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Escapes LIKE wildcards in user input and wraps it for a substring match.
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub struct SearchResolver {
    db: Arc<dyn DatabaseService>,
    embedder: Arc<dyn EmbeddingService>,
}

impl SearchResolver {
    pub fn new(db: Arc<dyn DatabaseService>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { db, embedder }
    }

    pub async fn resolve(&self, query: &SearchQuery) -> PortResult<Vec<HadithMatch>> {
        match query.mode {
            SearchMode::Keyword => {
                debug!(q = %query.text, page = query.page, limit = query.limit, "keyword search");
                let rows = self
                    .db
                    .search_hadiths(&query.text, query.limit, query.offset())
                    .await?;
                Ok(rows.into_iter().map(HadithMatch::from).collect())
            }
            SearchMode::Semantic => {
                debug!(q = %query.text, limit = query.limit, "semantic search");
                let embedding = self.embedder.embed(&query.text).await?;
                self.db
                    .match_hadiths(&embedding, MATCH_THRESHOLD, query.limit)
                    .await
            }
        }
    }

    /// Computes and stores the embedding for one hadith.
    pub async fn backfill_embedding(&self, hadith_id: uuid::Uuid, text: &str) -> PortResult<()> {
        let embedding = self.embedder.embed(text).await?;
        self.db.set_hadith_embedding(hadith_id, &embedding).await
    }
}
