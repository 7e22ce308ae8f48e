//! Run the full pipeline against a canned client.
//!
//! Shows how to plug a custom [`ModelClient`] into the pipeline, which is also
//! how the pipeline can be driven without network access.
//!
//! Run with:
//!   cargo run --example offline_report "topic"

use async_trait::async_trait;
use delve::{
    GenerateRequest, Generation, LazyClient, ModelClient, Pipeline, PipelineConfig,
    PipelineEvent, Source, StreamEvent, TextStream,
};
use futures::StreamExt;
use std::env;
use std::sync::Arc;

struct CannedClient;

#[async_trait]
impl ModelClient for CannedClient {
    async fn generate(&self, request: &GenerateRequest) -> delve::Result<Generation> {
        if request.response_schema.is_some() {
            return Ok(Generation {
                text: r#"{"questions": ["What is it?", "Where is it going?"], "rationale": "Definition, then outlook."}"#.to_string(),
                sources: vec![],
            });
        }

        Ok(Generation {
            text: "Canned findings for this question.".to_string(),
            sources: vec![Source::new("Example", "https://example.com")],
        })
    }

    async fn generate_stream(&self, _request: &GenerateRequest) -> delve::Result<TextStream> {
        let chunks = ["# Offline report\n\n", "Everything here ", "is canned.\n"];
        let events: Vec<delve::Result<StreamEvent>> = chunks
            .iter()
            .map(|c| Ok(StreamEvent::Text(c.to_string())))
            .chain(std::iter::once(Ok(StreamEvent::Done)))
            .collect();
        Ok(futures::stream::iter(events).boxed())
    }
}

#[tokio::main]
async fn main() -> delve::Result<()> {
    let topic = env::args().nth(1).unwrap_or_else(|| "Offline pipelines".to_string());

    let pipeline = Pipeline::new(
        LazyClient::ready(Arc::new(CannedClient)),
        PipelineConfig::new("canned").question_count(2),
    )
    .on_plan_ready(|event| {
        if let PipelineEvent::PlanReady { questions, .. } = event {
            for (i, q) in questions.iter().enumerate() {
                println!("{}. {}", i + 1, q);
            }
            println!();
        }
    })
    .on_token(|event| {
        if let PipelineEvent::Token { text } = event {
            print!("{}", text);
        }
    });

    let report = pipeline.run(&topic).await?;
    println!("\n{}", "─".repeat(40));
    println!("{}", report.to_markdown(true));
    Ok(())
}
