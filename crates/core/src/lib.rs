//! Core types shared across the grounded workspace.
//!
//! - [`AppError`] / [`AppResult`]: the single error taxonomy
//! - [`AppConfig`]: configuration built once at process entry
//! - [`logging::init_logging`]: stderr tracing setup

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, ChunkingSettings, EmbeddingSettings, GenerationSettings, RetrievalSettings};
pub use error::{AppError, AppResult};
