//! services/api/src/adapters/embedding.rs
//!
//! Implements the `EmbeddingService` port with the embeddings endpoint of the
//! OpenAI-compatible vendor.

use async_openai::{
    config::OpenAIConfig, error::OpenAIError, types::CreateEmbeddingRequestArgs, Client,
};
use async_trait::async_trait;
use hadith_core::ports::{EmbeddingService, PortError, PortResult};

#[derive(Clone)]
pub struct DeepSeekEmbeddingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl DeepSeekEmbeddingAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl EmbeddingService for DeepSeekEmbeddingAdapter {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(format!("DeepSeek API error: {}", e)))?;

        response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| PortError::MalformedResponse("embedding response was empty".to_string()))
    }
}
