//! Scripted completion client for offline runs and tests.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use grounded_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Canned reply used when nothing else is queued.
pub const DEFAULT_MOCK_REPLY: &str =
    "This answer was produced by the mock provider from the retrieved context.";

/// Returns queued replies in order, then a fixed default.
///
/// Every request is recorded so callers can inspect what was sent.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<AppResult<String>>>,
    default_reply: Option<String>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::with_default(DEFAULT_MOCK_REPLY)
    }

    pub fn with_default(reply: impl Into<String>) -> Self {
        Self {
            default_reply: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Queue a reply (or failure) for the next call.
    pub fn push_reply(&self, reply: AppResult<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let queued = self
            .replies
            .lock()
            .map_err(|_| AppError::Other("mock reply queue poisoned".to_string()))?
            .pop_front();

        let content = match queued {
            Some(reply) => reply?,
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| AppError::ProviderTransient("mock has no reply".to_string()))?,
        };

        Ok(LlmResponse {
            usage: LlmUsage::new(request.prompt.len() as u32 / 4, content.len() as u32 / 4),
            content,
            model: request.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_then_default() {
        let mock = MockLlmClient::with_default("fallback");
        mock.push_reply(Ok("first".to_string()));
        mock.push_reply(Err(AppError::RateLimited("429".into())));

        let request = LlmRequest::new("q", "m");
        assert_eq!(mock.complete(&request).await.unwrap().content, "first");
        assert!(matches!(
            mock.complete(&request).await,
            Err(AppError::RateLimited(_))
        ));
        assert_eq!(mock.complete(&request).await.unwrap().content, "fallback");
        assert_eq!(mock.requests().len(), 3);
    }
}
