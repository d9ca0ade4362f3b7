//! # Evidentia Core
//!
//! Core library for Evidentia research orchestration.
//! Provides LLM provider adapters with quota fallback, the dialectical
//! two-model coordinator, the five-phase research pipeline, the external
//! research job poller, and multi-source evidence aggregation.

pub mod config;
pub mod dialectic;
pub mod error;
pub mod evidence;
pub mod external_job;
pub mod http;
pub mod persistence;
pub mod pipeline;
pub mod providers;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{EvidentiaConfig, ProviderConfig, load_config};
pub use dialectic::{DialecticalCoordinator, DialecticalResult};
pub use error::{
    DialecticalError, EvidentiaError, JobError, PipelineError, ProviderError, Result, SourceError,
};
pub use evidence::{AcademicPaper, EvidenceAggregator, EvidenceSet, PaperSource, ScoredPaper};
pub use external_job::{ExternalJobClient, ExternalJobPoller, ExternalJobStatus, JobState};
pub use http::{HttpTransport, ReqwestTransport};
pub use pipeline::{PhasePipeline, PipelineEvent, PipelineRun, ResearchPhase};
pub use providers::{ProviderAdapter, ProviderDispatch, ProviderRegistry};
pub use types::{AiResponse, ProviderId};
