//! Pipeline configuration.

use crate::config::{DEFAULT_MODEL, Settings};
use crate::retry::RetryPolicy;

/// Configuration for a research run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// The model to use for every stage (e.g., "gemini-2.5-flash")
    pub model: String,
    /// Number of research questions requested from the coordinator
    pub question_count: usize,
    /// Maximum research requests in flight at once; unbounded when `None`
    pub max_concurrency: Option<usize>,
    /// Temperature for sampling
    pub temperature: Option<f32>,
    /// Backoff policy applied to every model call
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            question_count: 5,
            max_concurrency: None,
            temperature: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.model.clone(),
            question_count: settings.questions.max(1),
            max_concurrency: settings.max_concurrency.map(|n| n.max(1)),
            temperature: settings.temperature,
            retry: settings.retry,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with the specified model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set how many research questions to ask for.
    pub fn question_count(mut self, n: usize) -> Self {
        self.question_count = n.max(1);
        self
    }

    /// Limit concurrent research requests.
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n.max(1));
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }
}
