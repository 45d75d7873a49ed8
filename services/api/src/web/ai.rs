//! services/api/src/web/ai.rs
//!
//! The single AI dispatch endpoint. The `action` field selects one gateway
//! operation; each action fetches its context from the datastore first.

use axum::{extract::State, Json};
use hadith_core::ai::{DEFAULT_QUIZ_COUNT, DEFAULT_RECOMMENDATION_COUNT};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{ok, ApiJson, ApiResponse};
use crate::web::state::AppState;

/// Hadiths fed to `recommend`, most recently read first.
const RECENT_HADITHS: i64 = 10;
/// Hadiths fed to `ask` as supporting context.
const RELATED_HADITHS: i64 = 5;

/// Upper bound on quiz questions or recommendations per request.
const MAX_ITEMS: usize = 20;

const ACTIONS: [&str; 5] = ["explain", "quiz", "recommend", "ask", "challenge"];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AiRequest {
    Explain {
        #[serde(rename = "hadithId")]
        hadith_id: Uuid,
    },
    Quiz {
        #[serde(rename = "hadithId")]
        hadith_id: Uuid,
        count: Option<usize>,
    },
    Recommend {
        #[serde(rename = "userId")]
        user_id: String,
        count: Option<usize>,
    },
    Ask {
        question: String,
        #[serde(default)]
        topics: Vec<String>,
    },
    Challenge {
        #[serde(default)]
        topics: Vec<String>,
    },
}

impl AiRequest {
    /// Rejects unknown actions before the body is decoded against a variant.
    fn parse(body: Value) -> Result<Self, ApiError> {
        let known = body
            .get("action")
            .and_then(Value::as_str)
            .is_some_and(|action| ACTIONS.contains(&action));
        if !known {
            return Err(ApiError::BadRequest("Invalid action".to_string()));
        }
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

/// The requested item count, defaulted and clamped to `1..=MAX_ITEMS`.
fn item_count(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_ITEMS)
}

/// Run one AI study action.
#[utoipa::path(
    post,
    path = "/api/ai",
    request_body = AiRequest,
    responses(
        (status = 200, description = "`explanation`, `questions`, `recommendations`, `answer` or `challenge`"),
        (status = 400, description = "Invalid action or missing field"),
        (status = 404, description = "Unknown hadith"),
        (status = 500, description = "Vendor failure or malformed vendor JSON")
    )
)]
pub async fn ai_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let data = match AiRequest::parse(body)? {
        AiRequest::Explain { hadith_id } => {
            let hadith = state.db.get_hadith(hadith_id).await?;
            let explanation = state.ai.explain(&hadith).await?;
            json!({ "explanation": explanation })
        }
        AiRequest::Quiz { hadith_id, count } => {
            let hadith = state.db.get_hadith(hadith_id).await?;
            let questions = state
                .ai
                .generate_quiz(&hadith, item_count(count, DEFAULT_QUIZ_COUNT))
                .await?;
            json!({ "questions": questions })
        }
        AiRequest::Recommend { user_id, count } => {
            let recent = state.db.recent_hadiths_for_user(&user_id, RECENT_HADITHS).await?;
            let recommendations = state
                .ai
                .recommend(&user_id, &recent, item_count(count, DEFAULT_RECOMMENDATION_COUNT))
                .await?;
            json!({ "recommendations": recommendations })
        }
        AiRequest::Ask { question, topics } => {
            let related = state.db.hadiths_with_topics(&topics, RELATED_HADITHS).await?;
            let answer = state.ai.answer_question(&question, &related).await?;
            json!({ "answer": answer })
        }
        AiRequest::Challenge { topics } => {
            let challenge = state.ai.daily_challenge(&topics).await?;
            json!({ "challenge": challenge })
        }
    };
    Ok(ok(data))
}
