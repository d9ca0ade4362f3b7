//! LLM provider adapters.
//!
//! Every backend sits behind the [`ProviderAdapter`] contract:
//! - OpenAI-compatible chat completions (OpenAI, DeepSeek, Perplexity, Grok)
//! - Anthropic Messages API
//! - Google Gemini `generateContent`
//!
//! Use [`create_adapter()`] to build the adapter for a provider identity and
//! [`ProviderRegistry`] to dispatch calls with configuration and quota fallback.

pub mod anthropic;
pub mod fallback;
pub mod gemini;
pub mod mock;
pub mod openai_compat;
pub mod registry;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::http::{HttpReply, HttpTransport, TransportError};
use crate::types::{AiResponse, ProviderId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub use anthropic::AnthropicAdapter;
pub use fallback::{fallback_model_for, send_with_fallback};
pub use gemini::GeminiAdapter;
pub use mock::MockProvider;
pub use openai_compat::OpenAiCompatibleAdapter;
pub use registry::{ProviderDispatch, ProviderRegistry};

/// Prompt sent by connection probes.
pub const CONNECTION_PROBE: &str = "Reply with the single word OK.";

/// One single-turn request to a provider.
#[derive(Clone, Copy)]
pub struct ChatRequest<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub message: &'a str,
}

/// A single LLM backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identity of the backend this adapter talks to.
    fn provider(&self) -> ProviderId;

    /// Send one user message and return the normalized response.
    async fn send_message(&self, request: ChatRequest<'_>) -> Result<AiResponse, ProviderError>;

    /// Send a canned probe; any failure is logged and reported as `false`.
    async fn test_connection(&self, api_key: &str, model: &str) -> bool {
        let request = ChatRequest {
            api_key,
            model,
            message: CONNECTION_PROBE,
        };
        match self.send_message(request).await {
            Ok(_) => true,
            Err(e) => {
                debug!(provider = %self.provider(), model, error = %e, "Connection test failed");
                false
            }
        }
    }
}

/// Create the adapter for a provider identity.
///
/// The base URL comes from `config.base_url` when set, otherwise the
/// provider's public endpoint.
pub fn create_adapter(
    provider: ProviderId,
    config: &ProviderConfig,
    transport: Arc<dyn HttpTransport>,
) -> Arc<dyn ProviderAdapter> {
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| provider.default_base_url().to_string());
    match provider {
        ProviderId::Anthropic => Arc::new(AnthropicAdapter::new(transport, base_url)),
        ProviderId::Gemini => Arc::new(GeminiAdapter::new(transport, base_url)),
        ProviderId::OpenAi | ProviderId::DeepSeek | ProviderId::Perplexity | ProviderId::Grok => {
            Arc::new(OpenAiCompatibleAdapter::new(provider, transport, base_url))
        }
    }
}

/// Map a transport failure to the provider error taxonomy.
pub(crate) fn map_transport_error(provider: ProviderId, err: TransportError) -> ProviderError {
    match err {
        TransportError::Timeout(after) => ProviderError::Timeout {
            provider,
            timeout_secs: after.as_secs(),
        },
        TransportError::Connection(message) => ProviderError::Connection { provider, message },
    }
}

/// Turn a reply into parsed JSON, mapping non-2xx statuses to `ProviderError::Http`.
pub(crate) fn json_or_http_error(
    provider: ProviderId,
    model: &str,
    reply: HttpReply,
) -> Result<serde_json::Value, ProviderError> {
    if !reply.is_success() {
        debug!(provider = %provider, model, status = reply.status, "Provider returned error status");
        return Err(ProviderError::Http {
            provider,
            model: model.to_string(),
            status: reply.status,
            body: reply.body,
        });
    }
    reply.json().map_err(|e| ProviderError::ResponseParse {
        provider,
        message: format!("Invalid JSON: {e}"),
    })
}
