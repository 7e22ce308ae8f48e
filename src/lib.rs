//! Delve - plan, research and write Markdown reports with Gemini
//!
//! Delve runs a three-stage pipeline against a hosted model:
//! a coordinator breaks a topic into research questions, a researcher answers
//! all of them concurrently with search grounding, and a writer streams the
//! final report. Rate-limited calls are retried with exponential backoff.
//!
//! # Quick Start
//!
//! ```no_run
//! use delve::{GeminiClient, Pipeline, PipelineConfig, Settings, save_report};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> delve::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let pipeline = Pipeline::new(
//!         GeminiClient::lazy(settings.api.clone()),
//!         PipelineConfig::from(&settings),
//!     )
//!     .on_token(|event| {
//!         if let delve::PipelineEvent::Token { text } = event {
//!             print!("{}", text);
//!         }
//!     });
//!
//!     let report = pipeline.run("Solid-state batteries").await?;
//!     save_report(Path::new("output/output.md"), &report.to_markdown(true)).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
mod error;
pub mod pipeline;
mod report;
pub mod retry;

pub use client::{
    Credentials, GeminiClient, GenerateRequest, Generation, LazyClient, ModelClient, Source,
    StreamEvent, TextStream,
};
pub use config::{ApiSettings, Settings};
pub use error::{Error, Result};
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineEvent, ResearchPlan, ResearchResult, Stage,
};
pub use report::{ResearchReport, save_report};
pub use retry::{RetryPolicy, with_retry};
