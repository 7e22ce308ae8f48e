//! The plan → research → write pipeline.
//!
//! A [`Pipeline`] runs three stages against a model client:
//! - the coordinator turns the topic into a [`ResearchPlan`]
//! - the researcher answers every question concurrently with search grounding
//! - the writer streams the final Markdown report

mod config;
pub mod coordinator;
mod events;
mod prompt;
pub mod researcher;
mod types;
pub mod writer;

pub use config::PipelineConfig;
pub use events::{EventCallback, PipelineCallbacks, PipelineEvent, Stage};
pub use types::{ResearchPlan, ResearchResult};

use crate::client::LazyClient;
use crate::error::{Error, Result};
use crate::report::ResearchReport;
use events::verbose_callbacks;
use std::sync::{Arc, Mutex};
use tracing::Instrument;

/// Drives one research run per call to [`Pipeline::run`].
pub struct Pipeline {
    client: LazyClient,
    config: PipelineConfig,
    callbacks: PipelineCallbacks,
}

impl Pipeline {
    /// Create a pipeline over a lazily-created client.
    pub fn new(client: LazyClient, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            callbacks: PipelineCallbacks::default(),
        }
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // =========================================================================
    // Builder methods for callbacks
    // =========================================================================

    /// Report stage progress through `tracing`.
    ///
    /// Callbacks registered afterwards replace the matching verbose one.
    pub fn verbose(mut self, enabled: bool) -> Self {
        if enabled {
            let on_token = self.callbacks.on_token.take();
            let on_event = self.callbacks.on_event.take();
            let captured = self.callbacks.captured_events.take();
            self.callbacks = PipelineCallbacks {
                on_token,
                on_event,
                captured_events: captured,
                ..verbose_callbacks()
            };
        }
        self
    }

    /// Set a callback for streamed report fragments.
    pub fn on_token<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_token = Some(Arc::new(f));
        self
    }

    /// Set a callback for the finished plan.
    pub fn on_plan_ready<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_plan_ready = Some(Arc::new(f));
        self
    }

    /// Set a callback for completed research questions.
    pub fn on_question_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_question_finished = Some(Arc::new(f));
        self
    }

    /// Set a callback for error events.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    /// Set a catch-all callback for any event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_event = Some(Arc::new(f));
        self
    }

    /// Record every event for later inspection with [`Pipeline::take_events`].
    pub fn capture_events(mut self, enabled: bool) -> Self {
        self.callbacks.captured_events = enabled.then(|| Arc::new(Mutex::new(Vec::new())));
        self
    }

    /// Take the events recorded so far.
    pub fn take_events(&self) -> Vec<PipelineEvent> {
        if let Some(ref events) = self.callbacks.captured_events
            && let Ok(mut events) = events.lock()
        {
            return std::mem::take(&mut *events);
        }
        Vec::new()
    }

    fn emit(&self, event: PipelineEvent) {
        self.callbacks.emit(&event);
    }

    // =========================================================================
    // Main run
    // =========================================================================

    /// Research `topic` and write a report about it.
    ///
    /// An empty topic fails before the client is created.
    pub async fn run(&self, topic: &str) -> Result<ResearchReport> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::EmptyTopic);
        }

        let span = tracing::info_span!("research", model = self.config.model.as_str());
        match self.run_stages(topic).instrument(span).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.emit(PipelineEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_stages(&self, topic: &str) -> Result<ResearchReport> {
        let client = self.client.get().await?;
        let client = client.as_ref();

        self.emit(PipelineEvent::StageStarted {
            stage: Stage::Coordinator,
        });
        let plan = coordinator::plan(client, &self.config, topic).await?;
        self.emit(PipelineEvent::PlanReady {
            questions: plan.questions.clone(),
            rationale: plan.rationale.clone(),
        });

        self.emit(PipelineEvent::StageStarted {
            stage: Stage::Researcher,
        });
        let results =
            researcher::research_all(client, &self.config, &self.callbacks, topic, &plan).await?;

        self.emit(PipelineEvent::StageStarted {
            stage: Stage::Writer,
        });
        let body = writer::compose_report(
            client,
            &self.config,
            &self.callbacks,
            topic,
            &plan,
            &results,
        )
        .await?;
        self.emit(PipelineEvent::ReportReady { length: body.len() });

        Ok(ResearchReport {
            topic: topic.to_string(),
            plan,
            results,
            body,
        })
    }
}
