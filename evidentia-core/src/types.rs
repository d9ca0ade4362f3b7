//! Fundamental types shared across the Evidentia core.
//!
//! Provider identities, the normalized provider response, and the settings
//! value that callers hand to the pipeline instead of a global settings object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a supported LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Anthropic,
    Gemini,
    DeepSeek,
    Perplexity,
    Grok,
}

impl ProviderId {
    /// All supported providers, in display order.
    pub const ALL: [ProviderId; 6] = [
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::Gemini,
        ProviderId::DeepSeek,
        ProviderId::Perplexity,
        ProviderId::Grok,
    ];

    /// Stable lowercase identifier used in config files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Gemini => "gemini",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Perplexity => "perplexity",
            ProviderId::Grok => "grok",
        }
    }

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Anthropic => "Anthropic",
            ProviderId::Gemini => "Google Gemini",
            ProviderId::DeepSeek => "DeepSeek",
            ProviderId::Perplexity => "Perplexity",
            ProviderId::Grok => "xAI Grok",
        }
    }

    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OPENAI_API_KEY",
            ProviderId::Anthropic => "ANTHROPIC_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
            ProviderId::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderId::Perplexity => "PERPLEXITY_API_KEY",
            ProviderId::Grok => "XAI_API_KEY",
        }
    }

    /// Preferred model when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "gpt-4o",
            ProviderId::Anthropic => "claude-sonnet-4-20250514",
            ProviderId::Gemini => "gemini-2.5-pro",
            ProviderId::DeepSeek => "deepseek-reasoner",
            ProviderId::Perplexity => "sonar-pro",
            ProviderId::Grok => "grok-3",
        }
    }

    /// Default API base URL.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "https://api.openai.com/v1",
            ProviderId::Anthropic => "https://api.anthropic.com/v1",
            ProviderId::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderId::DeepSeek => "https://api.deepseek.com/v1",
            ProviderId::Perplexity => "https://api.perplexity.ai",
            ProviderId::Grok => "https://api.x.ai/v1",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "gemini" | "google" => Ok(ProviderId::Gemini),
            "deepseek" => Ok(ProviderId::DeepSeek),
            "perplexity" => Ok(ProviderId::Perplexity),
            "grok" | "xai" => Ok(ProviderId::Grok),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Normalized result of one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    /// Generated text.
    pub content: String,
    /// Provider that produced the response.
    pub provider: ProviderId,
    /// Model that actually served the request (the fallback model if one was used).
    pub model: String,
    /// Total tokens reported by the backend, if any.
    pub tokens_used: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_roundtrip_str() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
        }
        assert_eq!("Claude".parse::<ProviderId>().unwrap(), ProviderId::Anthropic);
        assert!("mystery".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_provider_id_serde_lowercase() {
        let json = serde_json::to_string(&ProviderId::DeepSeek).unwrap();
        assert_eq!(json, "\"deepseek\"");
        let back: ProviderId = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(back, ProviderId::OpenAi);
    }

    #[test]
    fn test_default_models_are_set() {
        assert_eq!(ProviderId::DeepSeek.default_model(), "deepseek-reasoner");
        for id in ProviderId::ALL {
            assert!(!id.default_model().is_empty());
            assert!(id.default_base_url().starts_with("https://"));
        }
    }
}
