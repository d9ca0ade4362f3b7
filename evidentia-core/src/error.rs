//! Error types for the Evidentia core.
//!
//! Uses `thiserror` for public API error types. Every variant that can reach a
//! caller carries enough context (provider, phase, stage, job) to be displayed
//! without further lookup.

use crate::dialectic::DialecticalStage;
use crate::pipeline::PhaseKind;
use crate::types::ProviderId;

/// Top-level error type for the Evidentia core library.
#[derive(Debug, thiserror::Error)]
pub enum EvidentiaError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Dialectical error: {0}")]
    Dialectical(#[from] DialecticalError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("External job error: {0}")]
    Job(#[from] JobError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("No API key configured for provider {provider}")]
    ConfigMissing { provider: ProviderId },

    #[error("Provider {provider} is disabled")]
    Disabled { provider: ProviderId },

    #[error("Provider {provider} returned HTTP {status} for model {model}: {body}")]
    Http {
        provider: ProviderId,
        model: String,
        status: u16,
        body: String,
    },

    #[error("Provider {provider} timed out after {timeout_secs}s")]
    Timeout {
        provider: ProviderId,
        timeout_secs: u64,
    },

    #[error("Provider {provider} connection failed: {message}")]
    Connection {
        provider: ProviderId,
        message: String,
    },

    #[error("Provider {provider} response parse error: {message}")]
    ResponseParse {
        provider: ProviderId,
        message: String,
    },
}

/// Body fragments that indicate an exhausted quota or balance.
const QUOTA_SIGNALS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "insufficient balance",
    "insufficient_balance",
    "insufficient_quota",
    "resource_exhausted",
    "resource exhausted",
    "too many requests",
    "credit balance",
];

impl ProviderError {
    /// The provider that produced this error.
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::ConfigMissing { provider }
            | ProviderError::Disabled { provider }
            | ProviderError::Http { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Connection { provider, .. }
            | ProviderError::ResponseParse { provider, .. } => *provider,
        }
    }

    /// HTTP status, when the failure came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this failure signals an exhausted quota, rate limit, or balance.
    ///
    /// Inferred from HTTP 429/402 or from the response body text.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            ProviderError::Http { status, body, .. } => {
                if matches!(status, 429 | 402) {
                    return true;
                }
                let lower = body.to_lowercase();
                QUOTA_SIGNALS.iter().any(|signal| lower.contains(signal))
            }
            _ => false,
        }
    }
}

/// Errors from the dialectical coordinator.
#[derive(Debug, thiserror::Error)]
pub enum DialecticalError {
    #[error("Dialectical mode requires a secondary provider distinct from {primary}")]
    InsufficientProviders { primary: ProviderId },

    #[error("Dialectical {stage} stage failed on provider {provider}: {source}")]
    StageFailed {
        stage: DialecticalStage,
        provider: ProviderId,
        #[source]
        source: ProviderError,
    },
}

/// Errors from the phase pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Research query is empty")]
    EmptyQuery,

    #[error("Phase '{phase}' failed: {cause}")]
    PhaseFailed {
        phase: PhaseKind,
        #[source]
        cause: Box<EvidentiaError>,
    },

    #[error("Invalid transition for phase '{phase}': {from} -> {to}")]
    InvalidTransition {
        phase: PhaseKind,
        from: String,
        to: String,
    },
}

/// Errors from the external-job poller.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("No API key configured for the external research agent")]
    ConfigMissing,

    #[error("Failed to start external job (HTTP {status}): {body}")]
    StartFailed { status: u16, body: String },

    #[error("External job poll failed (HTTP {status}): {body}")]
    PollFailed { status: u16, body: String },

    #[error("External job request failed: {message}")]
    Transport { message: String },

    #[error("External job response parse error: {message}")]
    ResponseParse { message: String },

    #[error("External job {job_id} timed out after {elapsed_ms}ms")]
    Timeout { job_id: String, elapsed_ms: u64 },

    #[error("Polling of external job {job_id} was aborted")]
    Aborted { job_id: String },

    #[error("External job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("External job {job_id} was cancelled remotely")]
    JobCancelled { job_id: String },
}

/// Errors from a bibliographic source client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("Source {source_id} returned HTTP {status}")]
    Http { source_id: String, status: u16 },

    #[error("Source {source_id} request failed: {message}")]
    Request { source_id: String, message: String },

    #[error("Source {source_id} response parse error: {message}")]
    Parse { source_id: String, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<Box<figment::Error>> for ConfigError {
    fn from(err: Box<figment::Error>) -> Self {
        ConfigError::ParseError {
            message: err.to_string(),
        }
    }
}

/// Errors from the run-history store.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History entry not found: {id}")]
    NotFound { id: String },

    #[error("History persistence failed: {message}")]
    Persistence { message: String },
}

/// A type alias for results using the top-level `EvidentiaError`.
pub type Result<T> = std::result::Result<T, EvidentiaError>;
