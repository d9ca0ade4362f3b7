//! Research phases and their lifecycle.
//!
//! A phase is created `Pending`, moves to `Running`, and ends exactly once in
//! `Completed` or `Error`. Terminal phases never change again.

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five fixed research phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    LiteratureDiscovery,
    ConceptualMapping,
    DeepEvidenceAnalysis,
    MethodologyDesign,
    Synthesis,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 5] = [
        PhaseKind::LiteratureDiscovery,
        PhaseKind::ConceptualMapping,
        PhaseKind::DeepEvidenceAnalysis,
        PhaseKind::MethodologyDesign,
        PhaseKind::Synthesis,
    ];

    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            PhaseKind::LiteratureDiscovery => "literature-discovery",
            PhaseKind::ConceptualMapping => "conceptual-mapping",
            PhaseKind::DeepEvidenceAnalysis => "deep-evidence-analysis",
            PhaseKind::MethodologyDesign => "methodology-design",
            PhaseKind::Synthesis => "synthesis",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhaseKind::LiteratureDiscovery => "Literature Discovery",
            PhaseKind::ConceptualMapping => "Conceptual Mapping",
            PhaseKind::DeepEvidenceAnalysis => "Deep Evidence Analysis",
            PhaseKind::MethodologyDesign => "Methodology Design",
            PhaseKind::Synthesis => "Synthesis",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl PhaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Error)
    }

    fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Error => "error",
        }
    }
}

/// One phase of a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPhase {
    pub id: String,
    pub kind: PhaseKind,
    pub name: String,
    pub status: PhaseStatus,
    /// Phase output on success, the error message on failure.
    pub output: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ResearchPhase {
    pub fn new(kind: PhaseKind) -> Self {
        Self {
            id: kind.id().to_string(),
            kind,
            name: kind.name().to_string(),
            status: PhaseStatus::Pending,
            output: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// All five phases, pending.
    pub fn all_pending() -> Vec<Self> {
        PhaseKind::ALL.iter().map(|k| Self::new(*k)).collect()
    }

    fn transition(&mut self, from: PhaseStatus, to: PhaseStatus) -> Result<(), PipelineError> {
        if self.status != from {
            return Err(PipelineError::InvalidTransition {
                phase: self.kind,
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Pending → Running`.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.transition(PhaseStatus::Pending, PhaseStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Running → Completed` with the phase output.
    pub fn complete(&mut self, output: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(PhaseStatus::Running, PhaseStatus::Completed)?;
        self.output = Some(output.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `Running → Error`, recording the error message as output.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(PhaseStatus::Running, PhaseStatus::Error)?;
        self.output = Some(message.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
