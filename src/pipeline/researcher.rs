//! Researcher stage: answer every question with search grounding, concurrently.

use super::config::PipelineConfig;
use super::events::{PipelineCallbacks, PipelineEvent};
use super::prompt::{RESEARCHER_SYSTEM, RESEARCHER_TEMPLATE, render};
use super::types::{ResearchPlan, ResearchResult};
use crate::client::{GenerateRequest, ModelClient, Source};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use futures::future::try_join_all;
use futures::{StreamExt, TryStreamExt, stream};
use std::collections::HashSet;

/// Research a single question.
pub async fn research_question(
    client: &dyn ModelClient,
    config: &PipelineConfig,
    topic: &str,
    question: &str,
) -> Result<ResearchResult> {
    let prompt = render(RESEARCHER_TEMPLATE, &[("topic", topic), ("question", question)]);
    let request = GenerateRequest::new(&config.model, prompt)
        .system(RESEARCHER_SYSTEM)
        .with_search()
        .temperature(config.temperature);

    let label = format!("researcher: {}", question);
    let generation = with_retry(&config.retry, &label, || client.generate(&request)).await?;

    let findings = generation.text.trim().to_string();
    if findings.is_empty() {
        return Err(Error::EmptyResponse);
    }

    Ok(ResearchResult {
        question: question.to_string(),
        findings,
        sources: dedup_sources(generation.sources),
    })
}

/// Research every question of `plan` concurrently.
///
/// Results come back in the plan's question order whatever order the requests
/// complete in. The first failure aborts the stage.
pub async fn research_all(
    client: &dyn ModelClient,
    config: &PipelineConfig,
    callbacks: &PipelineCallbacks,
    topic: &str,
    plan: &ResearchPlan,
) -> Result<Vec<ResearchResult>> {
    let tasks = plan.questions.iter().enumerate().map(|(index, question)| async move {
        callbacks.emit(&PipelineEvent::QuestionStarted {
            index,
            question: question.clone(),
        });
        let result = research_question(client, config, topic, question).await?;
        callbacks.emit(&PipelineEvent::QuestionFinished {
            index,
            question: question.clone(),
            sources: result.sources.len(),
        });
        Ok::<_, Error>(result)
    });

    match config.max_concurrency {
        Some(limit) => stream::iter(tasks).buffered(limit.max(1)).try_collect().await,
        None => try_join_all(tasks).await,
    }
}

/// Drop repeated citations of the same page, keeping first-seen order.
pub fn dedup_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|s| match &s.uri {
            Some(uri) => seen.insert(uri.clone()),
            None => s.title.is_some(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn plan(questions: &[&str]) -> ResearchPlan {
        ResearchPlan {
            questions: questions.iter().map(|q| q.to_string()).collect(),
            rationale: "r".to_string(),
        }
    }

    fn slow_fast_client() -> FakeClient {
        FakeClient::new()
            .with_finding(
                "Q-slow",
                "slow findings",
                vec![Source::new("A", "https://a.example")],
                Duration::from_secs(3),
            )
            .with_finding("Q-mid", "mid findings", vec![], Duration::from_secs(2))
            .with_finding("Q-fast", "fast findings", vec![], Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_question_order() {
        let client = slow_fast_client();
        let config = PipelineConfig::new("test-model");
        let finished = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order = finished.clone();
        let callbacks = PipelineCallbacks {
            on_question_finished: Some(Arc::new(move |e| {
                if let PipelineEvent::QuestionFinished { index, .. } = e {
                    order.lock().unwrap().push(*index);
                }
            })),
            ..Default::default()
        };

        let start = Instant::now();
        let results = research_all(
            &client,
            &config,
            &callbacks,
            "topic",
            &plan(&["Q-slow", "Q-mid", "Q-fast"]),
        )
        .await
        .unwrap();

        let questions: Vec<&str> = results.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["Q-slow", "Q-mid", "Q-fast"]);
        assert_eq!(results[0].findings, "slow findings");
        assert_eq!(results[0].sources.len(), 1);
        // completion order is the reverse of question order
        assert_eq!(*finished.lock().unwrap(), vec![2, 1, 0]);
        // all requests were in flight together
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_concurrency_keeps_order() {
        let client = slow_fast_client();
        let config = PipelineConfig::new("test-model").max_concurrency(1);

        let start = Instant::now();
        let results = research_all(
            &client,
            &config,
            &PipelineCallbacks::default(),
            "topic",
            &plan(&["Q-slow", "Q-mid", "Q-fast"]),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[2].question, "Q-fast");
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_one_failure_fails_stage() {
        let client = FakeClient::new().with_finding("Q1", "ok", vec![], Duration::ZERO);
        let config = PipelineConfig::new("test-model");

        let err = research_all(
            &client,
            &config,
            &PipelineCallbacks::default(),
            "topic",
            &plan(&["Q1", "Q2"]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_research_question_uses_search() {
        let client = FakeClient::new().with_finding(
            "Why?",
            "  Because.  ",
            vec![
                Source::new("A", "https://a.example"),
                Source::new("A again", "https://a.example"),
                Source {
                    title: None,
                    uri: None,
                },
            ],
            Duration::ZERO,
        );
        let config = PipelineConfig::new("test-model");

        let result = research_question(&client, &config, "topic", "Why?")
            .await
            .unwrap();
        assert_eq!(result.findings, "Because.");
        assert_eq!(result.sources, vec![Source::new("A", "https://a.example")]);
        assert!(client.prompts()[0].contains("topic"));
    }
}
