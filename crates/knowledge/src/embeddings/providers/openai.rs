//! OpenAI-compatible embeddings provider.
//!
//! Sends `POST {base}/embeddings` with `{model, input}` and retries rate
//! limits and transient failures according to the configured policy.

use crate::embeddings::provider::EmbeddingProvider;
use grounded_core::{AppError, AppResult};
use grounded_llm::http::{classify_status, classify_transport};
use grounded_llm::{with_retry, RetryPolicy};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const PROVIDER: &str = "OpenAI embeddings";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding client for OpenAI-compatible APIs.
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbeddingProvider {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimensions: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "OpenAI embedding provider requires API key".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| AppError::Config(format!("Invalid API key header: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimensions,
            retry,
        })
    }

    async fn request_once(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(PROVIDER, status, &text));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::ProviderTransient(format!("Failed to parse {} response: {}", PROVIDER, e))
        })?;

        into_ordered_vectors(parsed, texts.len())
    }
}

/// Order vectors by their `index` field and check one came back per input.
fn into_ordered_vectors(mut parsed: EmbeddingResponse, expected: usize) -> AppResult<Vec<Vec<f32>>> {
    if parsed.data.len() != expected {
        return Err(AppError::ProviderTransient(format!(
            "{} returned {} vectors for {} inputs",
            PROVIDER,
            parsed.data.len(),
            expected
        )));
    }

    parsed.data.sort_by_key(|d| d.index);

    if let Some(empty) = parsed.data.iter().find(|d| d.embedding.is_empty()) {
        return Err(AppError::ProviderTransient(format!(
            "{} returned an empty vector at index {}",
            PROVIDER, empty.index
        )));
    }

    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = with_retry(&self.retry, "embedding request", || self.request_once(texts)).await?;

        if let Some(first) = vectors.first() {
            if first.len() != self.dimensions {
                debug!(
                    "Embedding dimension {} differs from configured {}",
                    first.len(),
                    self.dimensions
                );
            }
        }

        Ok(vectors)
    }
}
