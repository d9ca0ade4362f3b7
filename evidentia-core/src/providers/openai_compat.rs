//! OpenAI-compatible chat completions adapter.
//!
//! Serves OpenAI, DeepSeek, Perplexity and xAI Grok, which all accept the
//! `POST {base}/chat/completions` request shape with Bearer authentication.

use super::{ChatRequest, ProviderAdapter, json_or_http_error, map_transport_error};
use crate::error::ProviderError;
use crate::http::HttpTransport;
use crate::types::{AiResponse, ProviderId};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Adapter for any endpoint following the OpenAI chat completions format.
pub struct OpenAiCompatibleAdapter {
    provider: ProviderId,
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl OpenAiCompatibleAdapter {
    pub fn new(provider: ProviderId, transport: Arc<dyn HttpTransport>, base_url: String) -> Self {
        Self {
            provider,
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Reasoning models reject a sampling temperature.
    fn accepts_temperature(model: &str) -> bool {
        !(model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
            || model == "deepseek-reasoner")
    }

    fn request_body(model: &str, message: &str) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": message}],
            "stream": false,
        });
        if Self::accepts_temperature(model) {
            body["temperature"] = json!(DEFAULT_TEMPERATURE);
        }
        body
    }

    /// Parse a chat completions body into an [`AiResponse`].
    fn parse_response(
        provider: ProviderId,
        body: &Value,
        model: &str,
    ) -> Result<AiResponse, ProviderError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ProviderError::ResponseParse {
                provider,
                message: "No choices in response".to_string(),
            })?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| ProviderError::ResponseParse {
                provider,
                message: "Choice has no text content".to_string(),
            })?;

        let tokens_used = body
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(|t| t.as_u64());

        Ok(AiResponse {
            content: content.to_string(),
            provider,
            model: model.to_string(),
            tokens_used,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn send_message(&self, request: ChatRequest<'_>) -> Result<AiResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(request.model, request.message);
        let auth = format!("Bearer {}", request.api_key);

        debug!(provider = %self.provider, url = %url, model = request.model, "Sending chat completion request");

        let reply = self
            .transport
            .post_json(&url, &[("Authorization", auth.as_str())], &body)
            .await
            .map_err(|e| map_transport_error(self.provider, e))?;

        let json = json_or_http_error(self.provider, request.model, reply)?;
        Self::parse_response(self.provider, &json, request.model)
    }
}
