//! Dialectical cross-validation over two providers.
//!
//! # Three-stage protocol
//!
//! 1. **Analyze**: primary and secondary answer the same prompt concurrently.
//! 2. **Cross-review**: each critiques the other's analysis, concurrently.
//! 3. **Synthesize**: the primary resolves both analyses and both critiques
//!    into one answer.
//!
//! Any failure aborts the run; the error names the stage and the provider.

use crate::error::{DialecticalError, ProviderError};
use crate::providers::ProviderDispatch;
use crate::types::{AiResponse, ProviderId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Separator between prior phase outputs in a prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Stage of the dialectical protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialecticalStage {
    Analyze,
    CrossReview,
    Synthesize,
}

impl fmt::Display for DialecticalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DialecticalStage::Analyze => "analyze",
            DialecticalStage::CrossReview => "cross-review",
            DialecticalStage::Synthesize => "synthesize",
        })
    }
}

/// One side's contribution: its own analysis and its critique of the other side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub provider: ProviderId,
    pub analysis: String,
    pub critique: String,
}

/// Outcome of one dialectical run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialecticalResult {
    pub primary: Perspective,
    pub secondary: Perspective,
    /// Produced by the primary provider.
    pub synthesis: AiResponse,
}

/// Append prior outputs to a prompt as labelled context.
pub fn with_previous_outputs(prompt: &str, previous_outputs: &[String]) -> String {
    if previous_outputs.is_empty() {
        return prompt.to_string();
    }
    format!(
        "{prompt}\n\n## Previous Research Phases\n\n{}",
        previous_outputs.join(CONTEXT_SEPARATOR)
    )
}

fn critique_prompt(original_prompt: &str, other: ProviderId, other_analysis: &str) -> String {
    format!(
        "Another research assistant ({}) produced the analysis below for this task:\n\n\
         \"{}\"\n\n--- Analysis ---\n{}\n--- End of analysis ---\n\n\
         Critically review it. Cover:\n\
         - Strengths\n\
         - Weaknesses and unsupported claims\n\
         - Missing points\n\
         - Alternative perspectives\n\n\
         Be specific and constructive.",
        other.display_name(),
        original_prompt,
        other_analysis
    )
}

fn synthesis_prompt(original_prompt: &str, primary: &Perspective, secondary: &Perspective) -> String {
    format!(
        "You are synthesizing two independent analyses of this task:\n\n\"{}\"\n\n\
         --- Analysis A ---\n{}\n\n\
         --- Analysis B ---\n{}\n\n\
         --- Critique of A (by B's author) ---\n{}\n\n\
         --- Critique of B (by A's author) ---\n{}\n\n\
         Produce one final answer. Resolve contradictions explicitly, keep the \
         points that survived critique, and drop claims the critiques refuted.",
        original_prompt,
        primary.analysis,
        secondary.analysis,
        secondary.critique,
        primary.critique
    )
}

/// Runs the analyze, cross-review, synthesize protocol over a dispatcher.
pub struct DialecticalCoordinator {
    dispatch: Arc<dyn ProviderDispatch>,
}

impl DialecticalCoordinator {
    pub fn new(dispatch: Arc<dyn ProviderDispatch>) -> Self {
        Self { dispatch }
    }

    /// Run all three stages.
    ///
    /// Fails with `InsufficientProviders` before any call when `secondary` is
    /// unset or equal to `primary`.
    pub async fn run(
        &self,
        primary: ProviderId,
        secondary: Option<ProviderId>,
        prompt: &str,
        previous_outputs: &[String],
    ) -> Result<DialecticalResult, DialecticalError> {
        let secondary = secondary
            .filter(|s| *s != primary)
            .ok_or(DialecticalError::InsufficientProviders { primary })?;
        let start = Instant::now();
        let full_prompt = with_previous_outputs(prompt, previous_outputs);

        info!(%primary, %secondary, "Dialectical stage 1: analyze");
        let (primary_analysis, secondary_analysis) = self
            .pair(
                DialecticalStage::Analyze,
                (primary, full_prompt.clone()),
                (secondary, full_prompt),
            )
            .await?;

        info!(%primary, %secondary, "Dialectical stage 2: cross-review");
        let (primary_critique, secondary_critique) = self
            .pair(
                DialecticalStage::CrossReview,
                (
                    primary,
                    critique_prompt(prompt, secondary, &secondary_analysis.content),
                ),
                (
                    secondary,
                    critique_prompt(prompt, primary, &primary_analysis.content),
                ),
            )
            .await?;

        let primary_view = Perspective {
            provider: primary,
            analysis: primary_analysis.content,
            critique: primary_critique.content,
        };
        let secondary_view = Perspective {
            provider: secondary,
            analysis: secondary_analysis.content,
            critique: secondary_critique.content,
        };

        info!(%primary, "Dialectical stage 3: synthesize");
        let synthesis = self
            .dispatch
            .send(primary, &synthesis_prompt(prompt, &primary_view, &secondary_view))
            .await
            .map_err(|source| stage_failed(DialecticalStage::Synthesize, primary, source))?;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            synthesis_len = synthesis.content.len(),
            "Dialectical run complete"
        );

        Ok(DialecticalResult {
            primary: primary_view,
            secondary: secondary_view,
            synthesis,
        })
    }

    /// Send two prompts concurrently and wait for both.
    async fn pair(
        &self,
        stage: DialecticalStage,
        (first, first_prompt): (ProviderId, String),
        (second, second_prompt): (ProviderId, String),
    ) -> Result<(AiResponse, AiResponse), DialecticalError> {
        let (a, b) = futures::future::join(
            self.dispatch.send(first, &first_prompt),
            self.dispatch.send(second, &second_prompt),
        )
        .await;
        let a = a.map_err(|source| stage_failed(stage, first, source))?;
        let b = b.map_err(|source| stage_failed(stage, second, source))?;
        Ok((a, b))
    }
}

fn stage_failed(stage: DialecticalStage, provider: ProviderId, source: ProviderError) -> DialecticalError {
    DialecticalError::StageFailed {
        stage,
        provider,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::http::ScriptedTransport;
    use crate::providers::{MockProvider, ProviderRegistry};
    use std::collections::BTreeMap;

    fn registry(primary: Arc<MockProvider>, secondary: Arc<MockProvider>) -> Arc<ProviderRegistry> {
        let configs: BTreeMap<_, _> = ProviderId::ALL
            .iter()
            .map(|id| (*id, ProviderConfig::with_key("k", id.default_model())))
            .collect();
        Arc::new(
            ProviderRegistry::new(configs, Arc::new(ScriptedTransport::new()))
                .with_adapter(primary)
                .with_adapter(secondary),
        )
    }

    #[test]
    fn test_with_previous_outputs() {
        assert_eq!(with_previous_outputs("p", &[]), "p");
        let composed = with_previous_outputs("p", &["one".into(), "two".into()]);
        assert!(composed.starts_with("p\n\n## Previous Research Phases"));
        assert!(composed.ends_with("one\n\n---\n\ntwo"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(DialecticalStage::CrossReview.to_string(), "cross-review");
    }

    #[tokio::test]
    async fn test_missing_secondary_fails_without_calls() {
        let a = Arc::new(MockProvider::with_response(ProviderId::OpenAi, "x"));
        let b = Arc::new(MockProvider::with_response(ProviderId::Anthropic, "y"));
        let coordinator = DialecticalCoordinator::new(registry(a.clone(), b.clone()));

        let err = coordinator
            .run(ProviderId::OpenAi, None, "q", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DialecticalError::InsufficientProviders { .. }));

        let err = coordinator
            .run(ProviderId::OpenAi, Some(ProviderId::OpenAi), "q", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DialecticalError::InsufficientProviders { .. }));
        assert_eq!(a.call_count() + b.call_count(), 0);
    }

    #[tokio::test]
    async fn test_full_protocol_call_pattern() {
        let a = Arc::new(MockProvider::new(ProviderId::OpenAi));
        a.queue_text("A analysis");
        a.queue_text("A critique of B");
        a.queue_text("final synthesis");
        let b = Arc::new(MockProvider::new(ProviderId::Anthropic));
        b.queue_text("B analysis");
        b.queue_text("B critique of A");

        let coordinator = DialecticalCoordinator::new(registry(a.clone(), b.clone()));
        let result = coordinator
            .run(
                ProviderId::OpenAi,
                Some(ProviderId::Anthropic),
                "Does sleep improve recall?",
                &["earlier phase".into()],
            )
            .await
            .unwrap();

        assert_eq!(a.call_count(), 3);
        assert_eq!(b.call_count(), 2);
        assert_eq!(result.synthesis.content, "final synthesis");
        assert_eq!(result.synthesis.provider, ProviderId::OpenAi);
        assert_eq!(result.primary.analysis, "A analysis");
        assert_eq!(result.secondary.critique, "B critique of A");

        let a_calls = a.calls();
        let b_calls = b.calls();
        assert!(a_calls[0].message.contains("earlier phase"));
        assert!(b_calls[0].message.contains("earlier phase"));
        // Each side reviews the other's analysis.
        assert!(a_calls[1].message.contains("B analysis"));
        assert!(b_calls[1].message.contains("A analysis"));
        // Synthesis sees both analyses and both critiques.
        for part in ["A analysis", "B analysis", "A critique of B", "B critique of A"] {
            assert!(a_calls[2].message.contains(part), "missing {part}");
        }
    }

    #[tokio::test]
    async fn test_cross_review_failure_names_stage_and_provider() {
        let a = Arc::new(MockProvider::new(ProviderId::OpenAi));
        a.queue_text("A analysis");
        a.queue_text("A critique");
        let b = Arc::new(MockProvider::new(ProviderId::Gemini));
        b.queue_text("B analysis");
        // second Gemini call has nothing scripted and fails

        let coordinator = DialecticalCoordinator::new(registry(a.clone(), b));
        let err = coordinator
            .run(ProviderId::OpenAi, Some(ProviderId::Gemini), "q", &[])
            .await
            .unwrap_err();

        match err {
            DialecticalError::StageFailed {
                stage, provider, ..
            } => {
                assert_eq!(stage, DialecticalStage::CrossReview);
                assert_eq!(provider, ProviderId::Gemini);
            }
            other => panic!("Expected StageFailed, got {:?}", other),
        }
        // No synthesis was attempted.
        assert_eq!(a.call_count(), 2);
    }
}
