//! Command handlers for the Grounded CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod embed;
pub mod ingest;
pub mod serve;
pub mod stats;

pub use ask::AskCommand;
pub use embed::EmbedCommand;
pub use ingest::IngestCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;

use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_knowledge::{create_provider, EmbeddingProvider, QueryContext};
use grounded_llm::{create_client, LlmClient};
use std::sync::Arc;

/// Build the embedding provider from configuration.
pub(crate) fn embedding_provider(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    create_provider(
        &config.embedding,
        &config.api_base,
        config.api_key.as_deref(),
        config.request_timeout(),
    )
}

/// Build the completion client from configuration.
pub(crate) fn completion_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    create_client(
        &config.generation.provider,
        &config.api_base,
        config.api_key.as_deref(),
        config.request_timeout(),
    )
    .map_err(AppError::Config)
}

/// Validate configuration and assemble everything the query path needs.
pub(crate) fn query_context(config: &AppConfig) -> AppResult<QueryContext> {
    config.validate()?;
    QueryContext::from_config(config, embedding_provider(config)?, completion_client(config)?)
}
