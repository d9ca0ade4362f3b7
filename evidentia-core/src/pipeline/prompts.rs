//! Per-phase prompt construction.

use super::phase::PhaseKind;

/// Number of most recent outputs the methodology phase sees.
const METHODOLOGY_CONTEXT: usize = 2;

fn template(kind: PhaseKind) -> &'static str {
    match kind {
        PhaseKind::LiteratureDiscovery => {
            "You are a research librarian. Identify the key literature for the research \
             question below: seminal works, recent high-impact studies, major review \
             articles, and the main schools of thought. For each work, state what it \
             contributes and how strong its evidence is."
        }
        PhaseKind::ConceptualMapping => {
            "You are a research methodologist. Build a conceptual map of the research \
             question below: core constructs and their definitions, hypothesized \
             relationships between them, competing theoretical frameworks, and open \
             conceptual disputes."
        }
        PhaseKind::DeepEvidenceAnalysis => {
            "You are an evidence analyst. Critically appraise the evidence bearing on the \
             research question below: effect sizes and consistency across studies, study \
             quality and risk of bias, contradictions between findings, and gaps where \
             evidence is thin."
        }
        PhaseKind::MethodologyDesign => {
            "You are a study designer. Propose a rigorous methodology to answer the \
             research question below: design, sampling, measures, analysis plan, threats \
             to validity and how to mitigate them."
        }
        PhaseKind::Synthesis => {
            "You are the lead investigator. Synthesize all prior phases into a coherent \
             final report on the research question below: principal conclusions with \
             their confidence, unresolved questions, and concrete recommendations."
        }
    }
}

/// The slice of prior outputs a phase receives as context.
pub fn history_for(kind: PhaseKind, outputs: &[String]) -> &[String] {
    match kind {
        PhaseKind::MethodologyDesign => {
            &outputs[outputs.len().saturating_sub(METHODOLOGY_CONTEXT)..]
        }
        _ => outputs,
    }
}

/// Phase template plus the research question, attachments and retrieved evidence.
///
/// Prior phase outputs are appended separately.
pub fn phase_prompt(
    kind: PhaseKind,
    query: &str,
    attachments: Option<&str>,
    evidence: Option<&str>,
) -> String {
    let mut prompt = format!(
        "{}\n\n## Research Question\n\n{}",
        template(kind),
        query.trim()
    );
    if let Some(attachments) = attachments.map(str::trim).filter(|a| !a.is_empty()) {
        prompt.push_str("\n\n## Attached Material\n\n");
        prompt.push_str(attachments);
    }
    if let Some(evidence) = evidence.map(str::trim).filter(|e| !e.is_empty()) {
        prompt.push_str(
            "\n\n## Retrieved Literature\n\nGround your answer in these sources where \
             relevant and cite them by number.\n\n",
        );
        prompt.push_str(evidence);
    }
    prompt
}
