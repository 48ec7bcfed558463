//! Prompt definitions for the grounded workspace.
//!
//! - YAML prompt definitions, built in or overridden per workspace
//! - Handlebars rendering without HTML escaping

pub mod builder;
pub mod loader;
pub mod types;

pub use builder::{build_prompt, render_template};
pub use loader::{builtin_prompt, list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};

/// Grounding prompt: answer from context, then list sources.
pub const ANSWER_PROMPT_ID: &str = "rag.answer";

/// Image description prompt used before embedding a multimodal query.
pub const VISION_PROMPT_ID: &str = "rag.vision";
