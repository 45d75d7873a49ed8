//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use hadith_core::ports::{CompletionService, DatabaseService, EmbeddingService};
use hadith_core::{AiGateway, GuardConfig, SearchResolver};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub ai: AiGateway,
    pub search: Arc<SearchResolver>,
    pub guard: GuardConfig,
}

impl AppState {
    /// Wires the core services around the given adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        completion: Arc<dyn CompletionService>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            search: Arc::new(SearchResolver::new(db.clone(), embedder)),
            ai: AiGateway::new(completion),
            guard: GuardConfig::default(),
            db,
            config,
        }
    }
}
