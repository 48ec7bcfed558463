//! Embedding provider trait and factory.

use super::providers::{MockProvider, OpenAiEmbeddingProvider};
use grounded_core::{AppError, AppResult, EmbeddingSettings};
use grounded_llm::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Embed several texts. The output is index-aligned with `texts`.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::ProviderTransient("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from settings.
///
/// `api_key` is required for the `openai` provider only.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_base: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(settings.dimensions))),

        "openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config(
                    "OpenAI embedding provider requires an API key (set GROUNDED_API_KEY)"
                        .to_string(),
                )
            })?;
            let provider = OpenAiEmbeddingProvider::new(
                api_base,
                api_key,
                &settings.model,
                settings.dimensions,
                timeout,
                RetryPolicy::from(settings),
            )?;
            Ok(Arc::new(provider))
        }

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: openai, mock",
            other
        ))),
    }
}
