//! services/api/src/web/hadiths.rs
//!
//! Hadith lookup, search and embedding backfill.

use axum::{
    extract::{Path, State},
    Json,
};
use hadith_core::domain::{Hadith, HadithMatch};
use hadith_core::search::{SearchMode, SearchQuery};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{ok, ApiJson, ApiQuery, ApiResponse};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Free-text query.
    pub q: Option<String>,
    /// `text` (default) or `semantic`.
    #[serde(rename = "type")]
    pub mode: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    pub hadith_id: Option<Uuid>,
    pub text: Option<String>,
}

/// Search hadiths by keyword or by meaning.
#[utoipa::path(
    get,
    path = "/api/hadiths/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching hadiths", body = [Hadith]),
        (status = 400, description = "Missing query or invalid parameters"),
        (status = 500, description = "Datastore or embedding failure")
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<ApiResponse<Vec<HadithMatch>>>> {
    let mode = params
        .mode
        .as_deref()
        .map(str::parse::<SearchMode>)
        .transpose()?
        .unwrap_or_default();
    let query = SearchQuery::new(params.q.unwrap_or_default(), mode, params.limit, params.page)?;

    let results = state.search.resolve(&query).await?;
    Ok(ok(results))
}

/// Compute and store the embedding of one hadith.
#[utoipa::path(
    post,
    path = "/api/hadiths/search",
    request_body = BackfillRequest,
    responses(
        (status = 200, description = "Embedding stored"),
        (status = 400, description = "Missing hadithId or text"),
        (status = 404, description = "Unknown hadith")
    )
)]
pub async fn backfill_embedding_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<BackfillRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let hadith_id = req
        .hadith_id
        .ok_or_else(|| ApiError::BadRequest("Missing required field: hadithId".to_string()))?;
    let text = req
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required field: text".to_string()))?;

    state.search.backfill_embedding(hadith_id, &text).await?;
    info!(%hadith_id, "Stored hadith embedding");
    Ok(Json(ApiResponse::acknowledged("Embedding updated")))
}

#[utoipa::path(
    get,
    path = "/api/hadiths/{id}",
    params(("id" = Uuid, Path, description = "Hadith id")),
    responses(
        (status = 200, description = "The hadith", body = Hadith),
        (status = 404, description = "Unknown hadith")
    )
)]
pub async fn get_hadith_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Hadith>>> {
    let hadith = state.db.get_hadith(id).await?;
    Ok(ok(hadith))
}
