//! Model client interface.
//!
//! The pipeline talks to the model only through [`ModelClient`], which exposes
//! a request/response call and a request/stream call. [`GeminiClient`] is the
//! production implementation; tests substitute a scripted fake.

mod credentials;
#[cfg(test)]
pub(crate) mod fake;
mod gemini;
mod lazy;

pub use credentials::Credentials;
pub use gemini::GeminiClient;
pub use lazy::LazyClient;

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A cited web source taken from a response's grounding metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: Option<String>,
    pub uri: Option<String>,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            uri: Some(uri.into()),
        }
    }
}

/// The terminal result of a non-streaming call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub sources: Vec<Source>,
}

/// Events produced by a streaming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One incremental fragment of output text
    Text(String),
    /// The model finished producing output
    Done,
}

/// Stream of incremental output returned by [`ModelClient::generate_stream`].
pub type TextStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A single content-generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// The model to use (e.g., "gemini-2.5-flash")
    pub model: String,
    /// The user prompt
    pub prompt: String,
    /// Optional system instruction
    pub system: Option<String>,
    /// Attach the search grounding tool
    pub search: bool,
    /// Constrain output to JSON matching this schema
    pub response_schema: Option<serde_json::Value>,
    /// Temperature for sampling
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    /// Create a request for the given model and prompt.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the system instruction.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Enable search grounding.
    pub fn with_search(mut self) -> Self {
        self.search = true;
        self
    }

    /// Request JSON output constrained to `schema`.
    pub fn json_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Set the temperature, leaving the model default when `None`.
    pub fn temperature(mut self, t: Option<f32>) -> Self {
        self.temperature = t;
        self
    }
}

/// Narrow interface over the hosted model API.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Perform a request/response call.
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation>;

    /// Open a streaming call. Errors opening the stream are returned directly;
    /// errors while reading it arrive as stream items.
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<TextStream>;
}
