//! Generation gateway for the grounded workspace.
//!
//! Provides a provider-agnostic [`LlmClient`] trait, an OpenAI-compatible
//! chat implementation (with image inputs), a scripted mock client, and the
//! retry policy shared by every remote call.
//!
//! # Example
//! ```no_run
//! use grounded_llm::{LlmClient, LlmRequest, providers::OpenAiClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::new("https://api.openai.com/v1", "sk-...", Duration::from_secs(60))?;
//! let request = LlmRequest::new("Hello, world!", "gpt-4o-mini");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod http;
pub mod providers;
pub mod retry;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::mock::DEFAULT_MOCK_REPLY;
pub use providers::{MockLlmClient, OpenAiClient};
pub use retry::{with_retry, RetryPolicy};
