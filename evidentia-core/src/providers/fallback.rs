//! One-shot model fallback on quota exhaustion.
//!
//! When the preferred model fails with a quota, rate-limit or balance signal,
//! the same provider is asked once more with its designated fallback model.
//! Any other failure, or a failure of the fallback call, propagates.

use super::{ChatRequest, ProviderAdapter};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::{AiResponse, ProviderId};
use tracing::{info, warn};

/// Designated fallback model for a provider.
pub fn default_fallback_model(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAi => "gpt-4o-mini",
        ProviderId::Anthropic => "claude-3-5-haiku-latest",
        ProviderId::Gemini => "gemini-2.0-flash",
        ProviderId::DeepSeek => "deepseek-chat",
        ProviderId::Perplexity => "sonar",
        ProviderId::Grok => "grok-3-mini",
    }
}

/// Fallback model for a configured provider, or `None` when it equals the
/// preferred model.
pub fn fallback_model_for(provider: ProviderId, config: &ProviderConfig) -> Option<String> {
    let fallback = config
        .fallback_model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default_fallback_model(provider).to_string());
    (fallback != config.model).then_some(fallback)
}

/// Send `message` with `model`, retrying once with `fallback` on quota exhaustion.
///
/// The returned [`AiResponse::model`] names the model that actually answered.
pub async fn send_with_fallback(
    adapter: &dyn ProviderAdapter,
    api_key: &str,
    model: &str,
    fallback: Option<&str>,
    message: &str,
) -> Result<AiResponse, ProviderError> {
    let request = ChatRequest {
        api_key,
        model,
        message,
    };
    let err = match adapter.send_message(request).await {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };

    let fallback = match fallback {
        Some(fb) if err.is_quota_exhausted() && fb != model => fb,
        _ => return Err(err),
    };

    warn!(
        provider = %adapter.provider(),
        model,
        fallback,
        error = %err,
        "Quota exhausted on preferred model; retrying with fallback"
    );

    let response = adapter
        .send_message(ChatRequest {
            model: fallback,
            ..request
        })
        .await?;
    info!(provider = %adapter.provider(), model = %response.model, "Fallback model answered");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;

    fn quota_error() -> ProviderError {
        ProviderError::Http {
            provider: ProviderId::DeepSeek,
            model: "deepseek-reasoner".into(),
            status: 429,
            body: "rate limit reached".into(),
        }
    }

    #[test]
    fn test_fallback_table() {
        let config = ProviderConfig::for_provider(ProviderId::DeepSeek);
        assert_eq!(
            fallback_model_for(ProviderId::DeepSeek, &config).as_deref(),
            Some("deepseek-chat")
        );
        let config = ProviderConfig::for_provider(ProviderId::Perplexity);
        assert_eq!(
            fallback_model_for(ProviderId::Perplexity, &config).as_deref(),
            Some("sonar")
        );
    }

    #[test]
    fn test_fallback_equal_to_preferred_is_none() {
        let config = ProviderConfig::with_key("k", "deepseek-chat");
        assert_eq!(fallback_model_for(ProviderId::DeepSeek, &config), None);
    }

    #[test]
    fn test_fallback_override() {
        let mut config = ProviderConfig::for_provider(ProviderId::OpenAi);
        config.fallback_model = Some("gpt-4.1-mini".into());
        assert_eq!(
            fallback_model_for(ProviderId::OpenAi, &config).as_deref(),
            Some("gpt-4.1-mini")
        );
    }

    #[tokio::test]
    async fn test_quota_failure_retries_once_with_fallback() {
        let mock = MockProvider::new(ProviderId::DeepSeek);
        mock.queue_error(quota_error());
        mock.queue_text("from fallback");

        let resp = send_with_fallback(
            &mock,
            "k",
            "deepseek-reasoner",
            Some("deepseek-chat"),
            "question",
        )
        .await
        .unwrap();

        assert_eq!(resp.content, "from fallback");
        assert_eq!(resp.model, "deepseek-chat");
        let models: Vec<_> = mock.calls().into_iter().map(|c| c.model).collect();
        assert_eq!(models, vec!["deepseek-reasoner", "deepseek-chat"]);
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates() {
        let mock = MockProvider::new(ProviderId::DeepSeek);
        mock.queue_error(quota_error());
        mock.queue_error(quota_error());

        let err = send_with_fallback(&mock, "k", "deepseek-reasoner", Some("deepseek-chat"), "q")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_non_quota_error_not_retried() {
        let mock = MockProvider::new(ProviderId::OpenAi);
        mock.queue_error(ProviderError::Http {
            provider: ProviderId::OpenAi,
            model: "gpt-4o".into(),
            status: 500,
            body: "server error".into(),
        });

        let err = send_with_fallback(&mock, "k", "gpt-4o", Some("gpt-4o-mini"), "q")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_when_fallback_equals_model() {
        let mock = MockProvider::new(ProviderId::DeepSeek);
        mock.queue_error(quota_error());

        let result =
            send_with_fallback(&mock, "k", "deepseek-chat", Some("deepseek-chat"), "q").await;
        assert!(result.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
