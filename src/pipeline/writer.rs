//! Writer stage: stream the final report from the collected findings.

use super::config::PipelineConfig;
use super::events::{PipelineCallbacks, PipelineEvent};
use super::prompt::{WRITER_SYSTEM, WRITER_TEMPLATE, render};
use super::types::{ResearchPlan, ResearchResult};
use crate::client::{GenerateRequest, ModelClient, StreamEvent};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use futures::StreamExt;

/// Format every finding, with its numbered sources, for the writer prompt.
pub fn format_findings(results: &[ResearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let mut block = format!(
                "=== QUESTION {} ===\n{}\n\n{}",
                i + 1,
                result.question,
                result.findings
            );
            let sources: Vec<String> = result
                .sources
                .iter()
                .filter_map(|s| {
                    let uri = s.uri.as_deref()?;
                    Some(match &s.title {
                        Some(title) => format!("[{}]({})", title, uri),
                        None => uri.to_string(),
                    })
                })
                .collect();
            if !sources.is_empty() {
                block.push_str("\n\nSources:");
                for (n, source) in sources.iter().enumerate() {
                    block.push_str(&format!("\n{}. {}", n + 1, source));
                }
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the writer prompt.
pub fn build_prompt(topic: &str, plan: &ResearchPlan, results: &[ResearchResult]) -> String {
    render(
        WRITER_TEMPLATE,
        &[
            ("topic", topic),
            ("rationale", &plan.rationale),
            ("findings", &format_findings(results)),
        ],
    )
}

/// Stream the report, forwarding each fragment as a [`PipelineEvent::Token`].
///
/// Returns the concatenation of all fragments in arrival order. Only opening
/// the stream is retried; a failure after output has started propagates.
pub async fn compose_report(
    client: &dyn ModelClient,
    config: &PipelineConfig,
    callbacks: &PipelineCallbacks,
    topic: &str,
    plan: &ResearchPlan,
    results: &[ResearchResult],
) -> Result<String> {
    let request = GenerateRequest::new(&config.model, build_prompt(topic, plan, results))
        .system(WRITER_SYSTEM)
        .temperature(config.temperature);

    let mut stream =
        with_retry(&config.retry, "writer", || client.generate_stream(&request)).await?;

    let mut body = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Text(text) => {
                callbacks.emit(&PipelineEvent::Token { text: text.clone() });
                body.push_str(&text);
            }
            StreamEvent::Done => break,
        }
    }

    if body.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }
    Ok(body)
}
