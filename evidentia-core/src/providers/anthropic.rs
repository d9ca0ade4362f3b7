//! Anthropic Messages API adapter.
//!
//! Differences from the OpenAI shape:
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - `max_tokens` is mandatory
//! - Response text lives in `content[]` blocks of type `text`

use super::{ChatRequest, ProviderAdapter, json_or_http_error, map_transport_error};
use crate::error::ProviderError;
use crate::http::HttpTransport;
use crate::types::{AiResponse, ProviderId};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

pub struct AnthropicAdapter {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: String) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn parse_response(body: &Value, model: &str) -> Result<AiResponse, ProviderError> {
        let blocks = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ProviderError::ResponseParse {
                provider: ProviderId::Anthropic,
                message: "Missing 'content' array in response".to_string(),
            })?;

        let text: Vec<&str> = blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect();
        if text.is_empty() {
            return Err(ProviderError::ResponseParse {
                provider: ProviderId::Anthropic,
                message: "No text blocks in response".to_string(),
            });
        }

        let usage = body.get("usage");
        let input = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(|t| t.as_u64());
        let output = usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(|t| t.as_u64());
        let tokens_used = match (input, output) {
            (None, None) => None,
            (i, o) => Some(i.unwrap_or(0) + o.unwrap_or(0)),
        };

        Ok(AiResponse {
            content: text.join(""),
            provider: ProviderId::Anthropic,
            model: model.to_string(),
            tokens_used,
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn send_message(&self, request: ChatRequest<'_>) -> Result<AiResponse, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        let body = json!({
            "model": request.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": request.message}],
        });

        debug!(url = %url, model = request.model, "Sending Anthropic messages request");

        let headers = [
            ("x-api-key", request.api_key),
            ("anthropic-version", ANTHROPIC_VERSION),
        ];
        let reply = self
            .transport
            .post_json(&url, &headers, &body)
            .await
            .map_err(|e| map_transport_error(ProviderId::Anthropic, e))?;

        let json = json_or_http_error(ProviderId::Anthropic, request.model, reply)?;
        Self::parse_response(&json, request.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpReply, ScriptedTransport};

    #[test]
    fn test_parse_text_blocks() {
        let body = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "First part. "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "Second part."}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 30}
        });
        let resp = AnthropicAdapter::parse_response(&body, "claude-sonnet-4-20250514").unwrap();
        assert_eq!(resp.content, "First part. Second part.");
        assert_eq!(resp.tokens_used, Some(42));
        assert_eq!(resp.provider, ProviderId::Anthropic);
    }

    #[test]
    fn test_parse_without_text_fails() {
        let body = json!({"content": []});
        assert!(AnthropicAdapter::parse_response(&body, "claude").is_err());
        let body = json!({"error": {"type": "overloaded_error"}});
        assert!(AnthropicAdapter::parse_response(&body, "claude").is_err());
    }

    #[tokio::test]
    async fn test_send_uses_api_key_header() {
        let transport = Arc::new(ScriptedTransport::new().with_reply(HttpReply::ok_json(&json!({
            "content": [{"type": "text", "text": "ok"}]
        }))));
        let adapter =
            AnthropicAdapter::new(transport.clone(), "https://api.anthropic.com/v1".into());
        let resp = adapter
            .send_message(ChatRequest {
                api_key: "sk-ant",
                model: "claude-3-5-haiku-latest",
                message: "hello",
            })
            .await
            .unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(resp.tokens_used, None);

        let req = &transport.requests()[0];
        assert_eq!(req.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(req.header("x-api-key"), Some("sk-ant"));
        assert_eq!(req.header("anthropic-version"), Some("2023-06-01"));
        assert!(req.header("Authorization").is_none());
        assert_eq!(req.body.as_ref().unwrap()["max_tokens"], 8192);
    }

    #[tokio::test]
    async fn test_credit_balance_error_is_quota() {
        let transport = Arc::new(ScriptedTransport::new().with_reply(HttpReply::new(
            400,
            r#"{"type":"error","error":{"message":"Your credit balance is too low"}}"#,
        )));
        let adapter = AnthropicAdapter::new(transport, "https://api.anthropic.com/v1".into());
        let err = adapter
            .send_message(ChatRequest {
                api_key: "k",
                model: "claude-sonnet-4-20250514",
                message: "m",
            })
            .await
            .unwrap_err();
        assert!(err.is_quota_exhausted());
    }
}
