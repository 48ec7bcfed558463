//! Completion client factory.

use crate::client::LlmClient;
use crate::providers::{MockLlmClient, OpenAiClient};
use std::sync::Arc;
use std::time::Duration;

/// Create a completion client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("openai", "mock")
/// * `endpoint` - Base URL of the OpenAI-compatible API
/// * `api_key` - API key (required for "openai")
/// * `timeout` - Per-request timeout
///
/// # Errors
/// Returns a message when the provider is unknown or its key is missing.
pub fn create_client(
    provider: &str,
    endpoint: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn LlmClient>, String> {
    match provider.to_lowercase().as_str() {
        "openai" => {
            let api_key = api_key.ok_or_else(|| "OpenAI provider requires API key".to_string())?;
            let client =
                OpenAiClient::new(endpoint, api_key, timeout).map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
        "mock" => Ok(Arc::new(MockLlmClient::new())),
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://aipipe.org/openai/v1";

    #[test]
    fn test_create_openai_client() {
        let client = create_client("openai", BASE, Some("sk-test"), Duration::from_secs(5)).unwrap();
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", BASE, None, Duration::from_secs(5)) {
            Err(err) => assert!(err.contains("requires API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_create_mock_client() {
        let client = create_client("MOCK", BASE, None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.provider_name(), "mock");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("ollama", BASE, None, Duration::from_secs(5)) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
