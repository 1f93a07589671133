//! Embedding generation: an async `Embedder` seam, isolating the HTTP
//! embedding provider from the indexing pipeline the way `llm::LlmClient`
//! isolates the chat provider from the graph runtime.

use async_openai::{
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};
use async_trait::async_trait;

use crate::error::RagError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embedding vector length for this backend, used to sanity-check a
    /// loaded index against the configured model.
    fn dimension(&self) -> usize;

    /// Model identifier recorded in persisted indices.
    fn model_name(&self) -> &str;
}

/// OpenAI Embeddings backend. Default model `text-embedding-3-small`
/// (1536 dimensions); any OpenAI-compatible provider works via a custom
/// `OpenAIConfig` base URL.
pub struct OpenAIEmbedder {
    config: OpenAIConfig,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_config(OpenAIConfig::new(), model)
    }

    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimensions = Self::model_dimensions(&model);
        OpenAIEmbedder { config, model, dimensions }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_dimensions(model: &str) -> usize {
        match model {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let client = Client::with_config(self.config.clone());
        let request = CreateEmbeddingRequest {
            input: EmbeddingInput::String(text.to_string()),
            model: self.model.clone(),
            ..Default::default()
        };
        let response = client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| RagError::EmbedderUnavailable(format!("embeddings api error: {e}")))?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::EmbedderUnavailable("no embedding returned".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A scripted embedder for tests: deterministic, content-derived vectors so
/// similarity comparisons in `index` tests are meaningful rather than
/// arbitrary, without requiring network access.
pub struct HashEmbedder {
    pub dims: usize,
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if text.is_empty() {
            return Err(RagError::EmbedderUnavailable("cannot embed empty text".to_string()));
        }
        let mut vector = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dims] += byte as f32;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}

/// Always-fails embedder, used to exercise the indexing pipeline's
/// continue-on-failure behavior.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
        Err(RagError::EmbedderUnavailable("scripted failure".to_string()))
    }

    fn dimension(&self) -> usize {
        0
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder { dims: 8 };
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn hash_embedder_rejects_empty_text() {
        let embedder = HashEmbedder { dims: 8 };
        assert!(embedder.embed("").await.is_err());
    }

    #[tokio::test]
    async fn failing_embedder_always_errors() {
        let embedder = FailingEmbedder;
        assert!(embedder.embed("anything").await.is_err());
    }

    #[test]
    fn openai_embedder_knows_model_dimensions() {
        assert_eq!(OpenAIEmbedder::new("text-embedding-3-small").dimension(), 1536);
        assert_eq!(OpenAIEmbedder::new("text-embedding-3-large").dimension(), 3072);
        assert_eq!(OpenAIEmbedder::new("unknown-model").dimension(), 1536);
    }
}
