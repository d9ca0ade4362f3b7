//! Optional query rewriting before the first phase.
//!
//! The active provider is asked to restate the query as a sharper research
//! prompt under a `## Enhanced Prompt` heading. Parsing is best-effort: when
//! the heading is missing, the original query followed by the raw response
//! is used instead.

use crate::providers::ProviderDispatch;
use crate::types::ProviderId;
use tracing::{debug, warn};

const ENHANCED_HEADING: &str = "## Enhanced Prompt";

/// Instruction sent to the provider.
pub fn enhancement_request(query: &str) -> String {
    format!(
        "Rewrite the following research query into a precise, well-scoped research \
         prompt. State the population, variables or phenomena of interest, the \
         comparison if any, and the expected outcome types.\n\n\
         Query: {}\n\n\
         Reply in this format:\n\n\
         {ENHANCED_HEADING}\n<the rewritten prompt>\n\n\
         ## Rationale\n<one short paragraph>",
        query.trim()
    )
}

/// Extract the enhanced prompt from a provider reply.
///
/// Takes the text after the `## Enhanced Prompt` heading up to the next
/// level-2 heading. Falls back to `query + "\n\n" + response`.
pub fn parse_enhanced_prompt(query: &str, response: &str) -> String {
    let section = response
        .find(ENHANCED_HEADING)
        .map(|start| &response[start + ENHANCED_HEADING.len()..])
        .map(|rest| match rest.find("\n## ") {
            Some(end) => &rest[..end],
            None => rest,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match section {
        Some(prompt) => prompt.to_string(),
        None => {
            debug!("Enhanced prompt heading not found; using query plus raw response");
            format!("{}\n\n{}", query.trim(), response.trim())
        }
    }
}

/// Ask `provider` to enhance `query`. Provider failures fall back to the query.
pub async fn enhance_query(dispatch: &dyn ProviderDispatch, provider: ProviderId, query: &str) -> String {
    match dispatch.send(provider, &enhancement_request(query)).await {
        Ok(response) => parse_enhanced_prompt(query, &response.content),
        Err(e) => {
            warn!(provider = %provider, error = %e, "Prompt enhancement failed; using original query");
            query.trim().to_string()
        }
    }
}
