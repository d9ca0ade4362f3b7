//! Google Gemini `generateContent` adapter.
//!
//! The model is part of the URL path and the key travels in the
//! `x-goog-api-key` header. Text is concatenated from
//! `candidates[0].content.parts[].text`.

use super::{ChatRequest, ProviderAdapter, json_or_http_error, map_transport_error};
use crate::error::ProviderError;
use crate::http::HttpTransport;
use crate::types::{AiResponse, ProviderId};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub struct GeminiAdapter {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl GeminiAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: String) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn parse_response(body: &Value, model: &str) -> Result<AiResponse, ProviderError> {
        let parse_err = |message: &str| ProviderError::ResponseParse {
            provider: ProviderId::Gemini,
            message: message.to_string(),
        };

        let candidate = body["candidates"]
            .as_array()
            .ok_or_else(|| parse_err("Missing 'candidates' array in response"))?
            .first()
            .ok_or_else(|| parse_err("Empty 'candidates' array in response"))?;

        let text: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate["finishReason"].as_str().unwrap_or("unknown");
            return Err(parse_err(&format!(
                "Candidate has no text (finishReason: {reason})"
            )));
        }

        Ok(AiResponse {
            content: text,
            provider: ProviderId::Gemini,
            model: model.to_string(),
            tokens_used: body["usageMetadata"]["totalTokenCount"].as_u64(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn send_message(&self, request: ChatRequest<'_>) -> Result<AiResponse, ProviderError> {
        let url = self.endpoint_url(request.model);
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": request.message}]}],
        });

        debug!(url = %url, model = request.model, "Sending Gemini generateContent request");

        let reply = self
            .transport
            .post_json(&url, &[("x-goog-api-key", request.api_key)], &body)
            .await
            .map_err(|e| map_transport_error(ProviderId::Gemini, e))?;

        let json = json_or_http_error(ProviderId::Gemini, request.model, reply)?;
        Self::parse_response(&json, request.model)
    }
}
