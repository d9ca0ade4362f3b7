//! Scripted provider adapter for tests.

use super::{ChatRequest, ProviderAdapter};
use crate::error::ProviderError;
use crate::types::{AiResponse, ProviderId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A call observed by [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub model: String,
    pub message: String,
}

/// Adapter that replays queued outcomes and records every call.
///
/// When the queue is empty it answers with the default text if one is set,
/// otherwise with a connection error.
pub struct MockProvider {
    provider: ProviderId,
    queue: Mutex<VecDeque<Result<String, ProviderError>>>,
    default_text: Option<String>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockProvider {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            queue: Mutex::new(VecDeque::new()),
            default_text: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock that always answers with `text`.
    pub fn with_response(provider: ProviderId, text: &str) -> Self {
        Self {
            default_text: Some(text.to_string()),
            ..Self::new(provider)
        }
    }

    pub fn queue_text(&self, text: &str) {
        self.push(Ok(text.to_string()));
    }

    pub fn queue_error(&self, error: ProviderError) {
        self.push(Err(error));
    }

    fn push(&self, outcome: Result<String, ProviderError>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn send_message(&self, request: ChatRequest<'_>) -> Result<AiResponse, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall {
                model: request.model.to_string(),
                message: request.message.to_string(),
            });

        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let text = match next {
            Some(outcome) => outcome?,
            None => self
                .default_text
                .clone()
                .ok_or_else(|| ProviderError::Connection {
                    provider: self.provider,
                    message: "mock has no scripted response".to_string(),
                })?,
        };

        Ok(AiResponse {
            content: text,
            provider: self.provider,
            model: request.model.to_string(),
            tokens_used: Some(42),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req<'a>(message: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            api_key: "k",
            model: "m",
            message,
        }
    }

    #[tokio::test]
    async fn test_queue_then_default() {
        let mock = MockProvider::with_response(ProviderId::Gemini, "default");
        mock.queue_text("first");
        assert_eq!(mock.send_message(req("a")).await.unwrap().content, "first");
        assert_eq!(mock.send_message(req("b")).await.unwrap().content, "default");
        assert_eq!(mock.calls()[1].message, "b");
    }

    #[tokio::test]
    async fn test_empty_mock_errors() {
        let mock = MockProvider::new(ProviderId::Grok);
        let err = mock.send_message(req("a")).await.unwrap_err();
        assert_eq!(err.provider(), ProviderId::Grok);
        assert_eq!(mock.call_count(), 1);
    }
}
