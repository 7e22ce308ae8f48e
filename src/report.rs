//! The finished report and how it is written to disk.

use crate::client::Source;
use crate::error::Result;
use crate::pipeline::{ResearchPlan, ResearchResult};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchReport {
    pub topic: String,
    pub plan: ResearchPlan,
    pub results: Vec<ResearchResult>,
    /// The writer's Markdown output
    pub body: String,
}

impl ResearchReport {
    /// Every cited page once, in first-cited order across all questions.
    pub fn unique_sources(&self) -> Vec<&Source> {
        let mut seen = HashSet::new();
        self.results
            .iter()
            .flat_map(|r| r.sources.iter())
            .filter(|s| s.uri.as_ref().is_some_and(|uri| seen.insert(uri.as_str())))
            .collect()
    }

    /// Render the report, optionally followed by a `## Sources` appendix.
    pub fn to_markdown(&self, include_sources: bool) -> String {
        let sources = self.unique_sources();
        if !include_sources || sources.is_empty() {
            return self.body.clone();
        }

        let mut out = self.body.trim_end().to_string();
        out.push_str("\n\n## Sources\n\n");
        for (i, source) in sources.iter().enumerate() {
            let uri = source.uri.as_deref().unwrap_or_default();
            let line = match source.title.as_deref() {
                Some(title) => format!("{}. [{}]({})\n", i + 1, title, uri),
                None => format!("{}. <{}>\n", i + 1, uri),
            };
            out.push_str(&line);
        }
        out
    }
}

/// Write `markdown` to `path`, creating missing parent directories.
pub async fn save_report(path: &Path, markdown: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, markdown).await?;
    tracing::debug!(path = %path.display(), bytes = markdown.len(), "Report saved");
    Ok(())
}
