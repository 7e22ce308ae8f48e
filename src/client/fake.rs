//! Scripted [`ModelClient`] for tests.

use super::{GenerateRequest, Generation, ModelClient, Source, StreamEvent, TextStream};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Finding {
    question: String,
    text: String,
    sources: Vec<Source>,
    delay: Duration,
}

/// Answers structured requests with a plan, search requests with the finding
/// whose question appears in the prompt, and streaming requests with fixed chunks.
#[derive(Default)]
pub(crate) struct FakeClient {
    plan: String,
    findings: Vec<Finding>,
    report_chunks: Vec<String>,
    /// Fail the report stream with this status after this many chunks
    report_error: Option<(usize, u16)>,
    /// Statuses returned, in order, before any call succeeds
    failures: Mutex<Vec<u16>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_plan(mut self, json: &str) -> Self {
        self.plan = json.to_string();
        self
    }

    pub(crate) fn with_finding(
        mut self,
        question: &str,
        text: &str,
        sources: Vec<Source>,
        delay: Duration,
    ) -> Self {
        self.findings.push(Finding {
            question: question.to_string(),
            text: text.to_string(),
            sources,
            delay,
        });
        self
    }

    pub(crate) fn with_report(mut self, chunks: &[&str]) -> Self {
        self.report_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    pub(crate) fn with_report_error(mut self, after: usize, status: u16) -> Self {
        self.report_error = Some((after, status));
        self
    }

    pub(crate) fn failing_first(self, statuses: &[u16]) -> Self {
        *self.failures.lock().unwrap() = statuses.iter().rev().copied().collect();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn record(&self, request: &GenerateRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        match self.failures.lock().unwrap().pop() {
            Some(status) => Err(Error::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ModelClient for FakeClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        self.record(request)?;

        if request.response_schema.is_some() {
            return Ok(Generation {
                text: self.plan.clone(),
                sources: Vec::new(),
            });
        }

        let finding = self
            .findings
            .iter()
            .find(|f| request.prompt.contains(&f.question))
            .ok_or_else(|| Error::Api {
                status: 400,
                message: format!("no scripted finding for prompt: {}", request.prompt),
            })?;
        tokio::time::sleep(finding.delay).await;

        Ok(Generation {
            text: finding.text.clone(),
            sources: finding.sources.clone(),
        })
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<TextStream> {
        self.record(request)?;

        let text = self.report_chunks.iter().map(|c| Ok(StreamEvent::Text(c.clone())));
        let events: Vec<Result<StreamEvent>> = match self.report_error {
            Some((after, status)) => text
                .take(after)
                .chain(std::iter::once(Err(Error::Api {
                    status,
                    message: "scripted stream failure".to_string(),
                })))
                .collect(),
            None => text.chain(std::iter::once(Ok(StreamEvent::Done))).collect(),
        };
        Ok(futures::stream::iter(events).boxed())
    }
}
