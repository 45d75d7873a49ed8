//! services/api/src/web/chat.rs
//!
//! The live study chat. A conversation is anchored to one hadith: the client's
//! current one, or else the first hadith whose text contains the message.

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use hadith_core::domain::{ChatHadith, ChatMessage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::web::rest::ApiJson;
use crate::web::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub current_hadith: Option<ChatHadith>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    pub hadith: Option<ChatHadith>,
}

impl ChatRequest {
    fn require_message(&self) -> ApiResult<()> {
        if self.message.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "Missing required field: message".to_string(),
            ));
        }
        Ok(())
    }
}

/// The client's hadith if it sent one, otherwise a direct text match on the message.
async fn anchor_hadith(state: &AppState, req: &ChatRequest) -> ApiResult<Option<ChatHadith>> {
    if let Some(current) = &req.current_hadith {
        return Ok(Some(current.clone()));
    }
    let found = state.db.find_hadith_by_text(&req.message).await?;
    Ok(found.as_ref().map(ChatHadith::from))
}

/// Send one chat turn and receive the full reply.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply and the hadith it discusses", body = ChatResponse),
        (status = 400, description = "Blank message"),
        (status = 500, description = "`{\"error\": \"Failed to process request\"}`")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Response {
    if let Err(e) = req.require_message() {
        return e.into_response();
    }
    let result = async {
        let hadith = anchor_hadith(&state, &req).await?;
        let response = state
            .ai
            .chat(&req.message, req.history.clone(), hadith.as_ref())
            .await?;
        Ok::<_, ApiError>(ChatResponse { response, hadith })
    }
    .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            error!("Chat API error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to process request" })),
            )
                .into_response()
        }
    }
}

/// Send one chat turn and stream the reply.
///
/// Emits a `hadith` event with the anchored hadith (or `null`), one unnamed
/// event per text fragment, then `done`. An upstream failure mid-stream ends
/// the stream with an `error` event instead.
#[utoipa::path(
    post,
    path = "/api/chat/stream",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Server-sent events", content_type = "text/event-stream"),
        (status = 400, description = "Blank message"),
        (status = 500, description = "The stream could not be opened")
    )
)]
pub async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    req.require_message()?;
    let hadith = anchor_hadith(&state, &req).await?;
    let hadith_event = Event::default()
        .event("hadith")
        .json_data(&hadith)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut fragments = state
        .ai
        .chat_stream(&req.message, req.history, hadith.as_ref())
        .await?;

    let events = async_stream::stream! {
        yield Ok(hadith_event);
        while let Some(fragment) = fragments.next().await {
            match fragment {
                // SSE frames cannot carry carriage returns.
                Ok(text) => yield Ok(Event::default().data(text.replace('\r', ""))),
                Err(e) => {
                    warn!("Chat stream aborted: {}", e);
                    yield Ok(Event::default().event("error").data(e.to_string().replace('\r', "")));
                    return;
                }
            }
        }
        yield Ok(Event::default().event("done").data("[DONE]"));
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
