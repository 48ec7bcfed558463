//! Error types for the grounded workspace.
//!
//! One enum covers every failure category: configuration, I/O, the remote
//! providers, the corpus store, ingestion, prompts and serialization.

use thiserror::Error;

/// Unified error type.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credentials, bad config values, unknown providers.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider answered 429.
    #[error("Provider rate limited: {0}")]
    RateLimited(String),

    /// Network failure, timeout, 5xx or an undecodable provider response.
    #[error("Provider error: {0}")]
    ProviderTransient(String),

    /// Provider rejected our credentials. Never retried.
    #[error("Provider authorization failed: {0}")]
    Unauthorized(String),

    /// Corpus store (SQLite) errors
    #[error("Store error: {0}")]
    Store(String),

    /// Malformed corpus input
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether a provider call that failed with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::RateLimited(_) | AppError::ProviderTransient(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
