//! Embedding provider trait and factory.

use super::providers::{MockProvider, OllamaProvider, OpenAiProvider};
use factrag_core::config::EmbeddingSettings;
use factrag_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in one call.
    ///
    /// The result has exactly `texts.len()` vectors, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (a one-item batch).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Provider("No embedding returned".to_string()))
    }
}

/// Verify a provider response against the request: same length, every
/// vector of dimension `dimensions`.
pub fn check_batch(
    provider: &str,
    requested: usize,
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
) -> AppResult<Vec<Vec<f32>>> {
    if vectors.len() != requested {
        return Err(AppError::Provider(format!(
            "{} returned {} embeddings for {} inputs",
            provider,
            vectors.len(),
            requested
        )));
    }

    if let Some((i, bad)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dimensions)
    {
        return Err(AppError::Provider(format!(
            "{} returned a {}-dimensional embedding at index {}, expected {}",
            provider,
            bad.len(),
            i,
            dimensions
        )));
    }

    Ok(vectors)
}

/// Create an embedding provider based on configuration.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let timeout = Duration::from_secs(settings.timeout_secs);

    match settings.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(settings.effective_dimensions()))),

        "ollama" => {
            let endpoint = settings
                .endpoint
                .as_deref()
                .unwrap_or(factrag_llm::providers::ollama::DEFAULT_OLLAMA_URL);
            Ok(Arc::new(OllamaProvider::new(
                endpoint,
                settings.effective_model(),
                settings.effective_dimensions(),
                timeout,
            )?))
        }

        "openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI embedding provider requires API key".to_string())
            })?;
            let endpoint = settings
                .endpoint
                .as_deref()
                .unwrap_or(factrag_llm::providers::openai::DEFAULT_OPENAI_URL);
            Ok(Arc::new(OpenAiProvider::new(
                endpoint,
                api_key,
                settings.effective_model(),
                settings.effective_dimensions(),
                timeout,
            )?))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: mock, openai, ollama",
            settings.provider
        ))),
    }
}
