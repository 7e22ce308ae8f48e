//! Coordinator stage: turn a topic into a research plan.

use super::config::PipelineConfig;
use super::prompt::{COORDINATOR_SYSTEM, COORDINATOR_TEMPLATE, render};
use super::types::ResearchPlan;
use crate::client::{GenerateRequest, ModelClient};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

/// Matches a Markdown code fence wrapping the whole response.
static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*```(?:json)?\s*\n([\s\S]*?)\n?```\s*$").expect("fence regex is valid")
});

/// JSON schema sent with the request to constrain the model's output.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {"type": "string"},
                "minItems": 1
            },
            "rationale": {"type": "string"}
        },
        "required": ["questions", "rationale"]
    })
}

/// Stricter schema the parsed output is validated against.
pub fn plan_schema() -> Value {
    let mut schema = response_schema();
    schema["properties"]["questions"]["items"] = json!({"type": "string", "pattern": "\\S"});
    schema
}

/// Ask the model for a research plan on `topic`.
pub async fn plan(
    client: &dyn ModelClient,
    config: &PipelineConfig,
    topic: &str,
) -> Result<ResearchPlan> {
    let count = config.question_count.to_string();
    let prompt = render(COORDINATOR_TEMPLATE, &[("topic", topic), ("count", &count)]);
    let request = GenerateRequest::new(&config.model, prompt)
        .system(COORDINATOR_SYSTEM)
        .json_schema(response_schema())
        .temperature(config.temperature);

    let generation = with_retry(&config.retry, "coordinator", || client.generate(&request)).await?;
    parse_plan(&generation.text)
}

/// Parse and validate the coordinator's JSON output.
pub fn parse_plan(text: &str) -> Result<ResearchPlan> {
    if text.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }

    let json = unwrap_fence(text);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::InvalidPlan(format!("response is not JSON: {}", e)))?;

    let schema = plan_schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| Error::InvalidPlan(format!("invalid plan schema: {}", e)))?;
    let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(Error::InvalidPlan(errors.join("; ")));
    }

    let mut plan: ResearchPlan =
        serde_json::from_value(value).map_err(|e| Error::InvalidPlan(e.to_string()))?;
    plan.questions = plan.questions.iter().map(|q| q.trim().to_string()).collect();
    plan.rationale = plan.rationale.trim().to_string();
    Ok(plan)
}

/// Strip a ```json fence if the model added one despite the JSON mime type.
fn unwrap_fence(text: &str) -> &str {
    FENCE_REGEX
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;

    #[test]
    fn test_parse_plain_json() {
        let plan = parse_plan(
            r#"{"questions": ["What is X?", " Who uses X? "], "rationale": "Covers basics."}"#,
        )
        .unwrap();
        assert_eq!(plan.questions, vec!["What is X?", "Who uses X?"]);
        assert_eq!(plan.rationale, "Covers basics.");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"questions\": [\"Q1\"], \"rationale\": \"R\"}\n```";
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.questions, vec!["Q1"]);
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(parse_plan("  \n"), Err(Error::EmptyResponse)));
    }

    #[test]
    fn test_not_json() {
        let err = parse_plan("Here are some questions: ...").unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }

    #[test]
    fn test_schema_violations() {
        for text in [
            r#"{"questions": [], "rationale": "r"}"#,
            r#"{"questions": ["ok", "   "], "rationale": "r"}"#,
            r#"{"questions": ["ok"]}"#,
            r#"{"questions": "ok", "rationale": "r"}"#,
            r#"["ok"]"#,
        ] {
            let err = parse_plan(text).unwrap_err();
            assert!(matches!(err, Error::InvalidPlan(_)), "accepted {}", text);
        }
    }

    #[tokio::test]
    async fn test_plan_requests_structured_output() {
        let client = FakeClient::new()
            .with_plan(r#"{"questions": ["A?", "B?"], "rationale": "two angles"}"#);
        let config = PipelineConfig::new("test-model").question_count(2);

        let plan = plan(&client, &config, "quantum batteries").await.unwrap();

        assert_eq!(plan.questions, vec!["A?", "B?"]);
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("quantum batteries"));
        assert!(prompts[0].contains("exactly 2 research questions"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_retries_rate_limit() {
        let client = FakeClient::new()
            .with_plan(r#"{"questions": ["A?"], "rationale": "r"}"#)
            .failing_first(&[429, 429]);
        let config = PipelineConfig::new("test-model");

        let plan = plan(&client, &config, "topic").await.unwrap();
        assert_eq!(plan.questions, vec!["A?"]);
        assert_eq!(client.calls(), 3);
    }
}
