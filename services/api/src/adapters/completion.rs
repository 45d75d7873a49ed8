//! services/api/src/adapters/completion.rs
//!
//! This module contains the adapter for the chat-completion LLM.
//! It implements the `CompletionService` port from the `core` crate against any
//! OpenAI-compatible endpoint (DeepSeek by default).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use hadith_core::domain::ChatRole;
use hadith_core::ports::{CompletionRequest, CompletionService, PortError, PortResult, TextStream};
use tracing::{debug, warn};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct DeepSeekCompletionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl DeepSeekCompletionAdapter {
    /// Creates a new `DeepSeekCompletionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn vendor_error(e: OpenAIError) -> PortError {
        PortError::Unexpected(format!("DeepSeek API error: {}", e))
    }

    fn build_err(e: OpenAIError) -> PortError {
        PortError::Unexpected(e.to_string())
    }

    /// System preamble, then the prior turns in order, then the prompt.
    fn messages(request: &CompletionRequest) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.as_str())
                .build()
                .map_err(Self::build_err)?
                .into(),
        );
        for turn in &request.history {
            let message: ChatCompletionRequestMessage = match turn.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(Self::build_err)?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(Self::build_err)?
                    .into(),
            };
            messages.push(message);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.as_str())
                .build()
                .map_err(Self::build_err)?
                .into(),
        );
        Ok(messages)
    }

    #[allow(deprecated)]
    fn chat_request(&self, request: &CompletionRequest) -> PortResult<CreateChatCompletionRequest> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::messages(request)?)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .n(1)
            .build()
            .map_err(Self::build_err)
    }
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for DeepSeekCompletionAdapter {
    async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
        let chat_request = self.chat_request(&request)?;
        debug!(model = %self.model, turns = request.history.len(), "Requesting completion");

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(Self::vendor_error)?;

        // Extract the text content from the first choice in the response.
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            PortError::MalformedResponse("completion returned no choices".to_string())
        })?;
        choice.message.content.ok_or_else(|| {
            PortError::MalformedResponse("completion contained no text content".to_string())
        })
    }

    async fn complete_streaming(&self, request: CompletionRequest) -> PortResult<TextStream> {
        let mut chat_request = self.chat_request(&request)?;
        chat_request.stream = Some(true);
        debug!(model = %self.model, turns = request.history.len(), "Opening completion stream");

        let upstream = self
            .client
            .chat()
            .create_stream(chat_request)
            .await
            .map_err(Self::vendor_error)?;

        // Empty deltas (role announcements, the final stop chunk) are dropped.
        let fragments = upstream.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => {
                    let text: String = response
                        .choices
                        .into_iter()
                        .filter_map(|choice| choice.delta.content)
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => {
                    warn!("Completion stream failed: {}", e);
                    Some(Err(Self::vendor_error(e)))
                }
            }
        });
        Ok(Box::pin(fragments))
    }
}
