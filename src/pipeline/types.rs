//! Data produced by the pipeline stages.

use crate::client::Source;
use serde::{Deserialize, Serialize};

/// The coordinator's output: what to research and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub questions: Vec<String>,
    pub rationale: String,
}

/// Findings for one research question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub question: String,
    pub findings: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}
