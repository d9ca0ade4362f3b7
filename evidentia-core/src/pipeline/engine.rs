//! The sequential five-phase research pipeline.
//!
//! Phase *i+1* starts only after phase *i* is terminal. The first failing
//! phase records its error as output and halts the run; later phases stay
//! pending. A fully successful run yields a report made of every phase
//! output joined by a fixed separator, and is handed to the history store.

use super::enhance::enhance_query;
use super::history::{HistoryEntry, HistoryStore};
use super::phase::{PhaseKind, PhaseStatus, ResearchPhase};
use super::prompts::{history_for, phase_prompt};
use crate::config::ResearchSettings;
use crate::dialectic::{CONTEXT_SEPARATOR, DialecticalCoordinator, with_previous_outputs};
use crate::error::{EvidentiaError, PipelineError};
use crate::evidence::{EvidenceAggregator, EvidenceSet, format_evidence};
use crate::providers::ProviderDispatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Separator between phase outputs in the final report.
pub const REPORT_SEPARATOR: &str = CONTEXT_SEPARATOR;

/// Papers listed in the literature-discovery prompt.
const EVIDENCE_IN_PROMPT: usize = 25;

const TOPIC_MAX_CHARS: usize = 120;

/// Progress notification published while a run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    PromptEnhanced { prompt: String },
    EvidenceGathered { papers: usize, queries: usize },
    PhaseStarted { index: usize, phase: PhaseKind },
    PhaseCompleted { index: usize, phase: PhaseKind, output_chars: usize },
    PhaseFailed { index: usize, phase: PhaseKind, error: String },
    Finished { success: bool },
}

/// State and outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub topic: String,
    /// Prompt the phases ran on.
    pub prompt: String,
    pub phases: Vec<ResearchPhase>,
    /// Present only when every phase completed.
    pub report: Option<String>,
    pub evidence: Option<EvidenceSet>,
}

impl PipelineRun {
    pub fn is_complete(&self) -> bool {
        self.report.is_some()
    }

    /// The phase that halted the run, if any.
    pub fn failed_phase(&self) -> Option<&ResearchPhase> {
        self.phases
            .iter()
            .find(|p| p.status == PhaseStatus::Error)
    }
}

fn topic_of(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.chars().count() <= TOPIC_MAX_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(TOPIC_MAX_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// Runs the five research phases against a provider dispatcher.
pub struct PhasePipeline {
    dispatch: Arc<dyn ProviderDispatch>,
    settings: ResearchSettings,
    aggregator: Option<Arc<EvidenceAggregator>>,
    history: Option<Arc<dyn HistoryStore>>,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl PhasePipeline {
    pub fn new(dispatch: Arc<dyn ProviderDispatch>, settings: ResearchSettings) -> Self {
        Self {
            dispatch,
            settings,
            aggregator: None,
            history: None,
            events: None,
        }
    }

    /// Ground the literature phase in aggregated papers.
    pub fn with_evidence(mut self, aggregator: Arc<EvidenceAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    /// Execute the pipeline and return the run whether or not a phase failed.
    pub async fn execute(
        &self,
        query: &str,
        attachments: Option<&str>,
    ) -> Result<PipelineRun, PipelineError> {
        self.drive(query, attachments).await.map(|(run, _)| run)
    }

    /// Execute the pipeline; a failed phase becomes `PipelineError::PhaseFailed`.
    pub async fn run(
        &self,
        query: &str,
        attachments: Option<&str>,
    ) -> Result<PipelineRun, PipelineError> {
        match self.drive(query, attachments).await? {
            (run, None) => Ok(run),
            (_, Some((phase, cause))) => Err(PipelineError::PhaseFailed {
                phase,
                cause: Box::new(cause),
            }),
        }
    }

    async fn drive(
        &self,
        query: &str,
        attachments: Option<&str>,
    ) -> Result<(PipelineRun, Option<(PhaseKind, EvidentiaError)>), PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::EmptyQuery);
        }
        let start = Instant::now();
        let active = self.settings.active_provider;
        let partner = self.settings.dialectical_partner();

        let prompt = if self.settings.enhance_prompt {
            let enhanced = enhance_query(self.dispatch.as_ref(), active, query).await;
            self.emit(PipelineEvent::PromptEnhanced {
                prompt: enhanced.clone(),
            });
            enhanced
        } else {
            query.trim().to_string()
        };

        let mut run = PipelineRun {
            id: Uuid::new_v4(),
            topic: topic_of(query),
            prompt,
            phases: ResearchPhase::all_pending(),
            report: None,
            evidence: None,
        };

        info!(
            run_id = %run.id,
            provider = %active,
            dialectical = partner.is_some(),
            "Starting research pipeline"
        );

        let mut outputs: Vec<String> = Vec::with_capacity(PhaseKind::ALL.len());
        let mut failure = None;

        for (index, kind) in PhaseKind::ALL.into_iter().enumerate() {
            run.phases[index].start()?;
            self.emit(PipelineEvent::PhaseStarted { index, phase: kind });
            info!(phase = %kind, index, "Phase started");

            let evidence_block = if kind == PhaseKind::LiteratureDiscovery {
                self.gather_evidence(&mut run).await
            } else {
                None
            };
            let base = phase_prompt(kind, &run.prompt, attachments, evidence_block.as_deref());
            let context = history_for(kind, &outputs);

            let result: Result<String, EvidentiaError> = match partner {
                Some(secondary) => DialecticalCoordinator::new(self.dispatch.clone())
                    .run(active, Some(secondary), &base, context)
                    .await
                    .map(|r| r.synthesis.content)
                    .map_err(EvidentiaError::from),
                None => self
                    .dispatch
                    .send(active, &with_previous_outputs(&base, context))
                    .await
                    .map(|r| r.content)
                    .map_err(EvidentiaError::from),
            };

            match result {
                Ok(output) => {
                    self.emit(PipelineEvent::PhaseCompleted {
                        index,
                        phase: kind,
                        output_chars: output.chars().count(),
                    });
                    run.phases[index].complete(output.clone())?;
                    outputs.push(output);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(phase = %kind, error = %message, "Phase failed; halting pipeline");
                    run.phases[index].fail(message.clone())?;
                    self.emit(PipelineEvent::PhaseFailed {
                        index,
                        phase: kind,
                        error: message,
                    });
                    failure = Some((kind, e));
                    break;
                }
            }
        }

        if failure.is_none() {
            let report = outputs.join(REPORT_SEPARATOR);
            self.record_history(&run, &report).await;
            run.report = Some(report);
        }

        info!(
            run_id = %run.id,
            success = failure.is_none(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Research pipeline finished"
        );
        self.emit(PipelineEvent::Finished {
            success: failure.is_none(),
        });
        Ok((run, failure))
    }

    async fn gather_evidence(&self, run: &mut PipelineRun) -> Option<String> {
        let aggregator = self.aggregator.as_ref()?;
        let set = aggregator.aggregate_default(&run.prompt).await;
        self.emit(PipelineEvent::EvidenceGathered {
            papers: set.papers.len(),
            queries: set.queries.len(),
        });
        let block = if set.papers.is_empty() {
            "No indexed papers were found for this question; rely on your own knowledge \
             and flag uncertain citations."
                .to_string()
        } else {
            format_evidence(&set.papers, EVIDENCE_IN_PROMPT)
        };
        run.evidence = Some(set);
        Some(block)
    }

    /// Stores do blocking file I/O, so the save runs on the blocking pool.
    async fn record_history(&self, run: &PipelineRun, report: &str) {
        let Some(store) = self.history.clone() else {
            return;
        };
        let entry = HistoryEntry {
            id: run.id,
            ..HistoryEntry::new(&run.topic, &run.prompt, report, run.phases.clone())
        };
        match tokio::task::spawn_blocking(move || store.save(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(run_id = %run.id, error = %e, "Failed to persist research history");
            }
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "History save task panicked");
            }
        }
    }
}
