//! Sequential multi-phase research pipeline.
//!
//! Five fixed phases run in order, each prompted with the research question
//! and the outputs of the phases before it:
//!
//! 1. Literature discovery (optionally grounded in aggregated papers)
//! 2. Conceptual mapping
//! 3. Deep evidence analysis
//! 4. Methodology design (sees only the two most recent outputs)
//! 5. Synthesis

pub mod engine;
pub mod enhance;
pub mod history;
pub mod phase;
pub mod prompts;

pub use engine::{PhasePipeline, PipelineEvent, PipelineRun, REPORT_SEPARATOR};
pub use enhance::{enhance_query, parse_enhanced_prompt};
pub use history::{
    HistoryEntry, HistoryStore, HistorySummary, InMemoryHistoryStore, JsonFileHistoryStore,
};
pub use phase::{PhaseKind, PhaseStatus, ResearchPhase};
