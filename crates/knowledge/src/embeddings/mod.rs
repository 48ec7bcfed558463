//! Embedding gateway.
//!
//! Turns text into dense vectors through a provider-agnostic trait. The
//! OpenAI-compatible provider is used in production; the mock provider gives
//! deterministic vectors for offline runs and tests.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{MockProvider, OpenAiEmbeddingProvider};
