//! Pipeline events and callbacks for observability.

use std::sync::{Arc, Mutex};

/// The three stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Coordinator,
    Researcher,
    Writer,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Coordinator => "coordinator",
            Stage::Researcher => "researcher",
            Stage::Writer => "writer",
        };
        f.write_str(name)
    }
}

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A stage is starting
    StageStarted { stage: Stage },
    /// The coordinator produced a plan
    PlanReady {
        questions: Vec<String>,
        rationale: String,
    },
    /// A research request was issued
    QuestionStarted { index: usize, question: String },
    /// A research request completed
    QuestionFinished {
        index: usize,
        question: String,
        sources: usize,
    },
    /// The writer streamed a fragment of the report
    Token { text: String },
    /// The report body is complete
    ReportReady { length: usize },
    /// The run failed
    Error { message: String },
}

/// Type alias for event callbacks
pub type EventCallback = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Storage for pipeline callbacks
#[derive(Default, Clone)]
pub struct PipelineCallbacks {
    pub on_stage_started: Option<EventCallback>,
    pub on_plan_ready: Option<EventCallback>,
    pub on_question_started: Option<EventCallback>,
    pub on_question_finished: Option<EventCallback>,
    pub on_token: Option<EventCallback>,
    pub on_report_ready: Option<EventCallback>,
    pub on_error: Option<EventCallback>,
    /// Catch-all callback for any event
    pub on_event: Option<EventCallback>,
    pub(crate) captured_events: Option<Arc<Mutex<Vec<PipelineEvent>>>>,
}

impl PipelineCallbacks {
    /// Emit an event to the appropriate callback(s)
    pub fn emit(&self, event: &PipelineEvent) {
        if let Some(ref events) = self.captured_events
            && let Ok(mut events) = events.lock()
        {
            events.push(event.clone());
        }

        let specific = match event {
            PipelineEvent::StageStarted { .. } => &self.on_stage_started,
            PipelineEvent::PlanReady { .. } => &self.on_plan_ready,
            PipelineEvent::QuestionStarted { .. } => &self.on_question_started,
            PipelineEvent::QuestionFinished { .. } => &self.on_question_finished,
            PipelineEvent::Token { .. } => &self.on_token,
            PipelineEvent::ReportReady { .. } => &self.on_report_ready,
            PipelineEvent::Error { .. } => &self.on_error,
        };

        if let Some(cb) = specific {
            cb(event);
        }

        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }
}

/// Callbacks that report progress through `tracing`.
pub fn verbose_callbacks() -> PipelineCallbacks {
    PipelineCallbacks {
        on_stage_started: Some(Arc::new(|e| {
            if let PipelineEvent::StageStarted { stage } = e {
                tracing::info!(%stage, "Stage started");
            }
        })),
        on_plan_ready: Some(Arc::new(|e| {
            if let PipelineEvent::PlanReady {
                questions,
                rationale,
            } = e
            {
                tracing::info!(questions = questions.len(), "Research plan ready");
                for (i, question) in questions.iter().enumerate() {
                    tracing::info!("  {}. {}", i + 1, question);
                }
                tracing::debug!(rationale = rationale.as_str(), "Plan rationale");
            }
        })),
        on_question_started: Some(Arc::new(|e| {
            if let PipelineEvent::QuestionStarted { index, question } = e {
                tracing::debug!(index, question = question.as_str(), "Researching");
            }
        })),
        on_question_finished: Some(Arc::new(|e| {
            if let PipelineEvent::QuestionFinished {
                index,
                question,
                sources,
            } = e
            {
                let preview: String = question.chars().take(60).collect();
                tracing::info!(index, sources, "Researched: {}", preview);
            }
        })),
        on_report_ready: Some(Arc::new(|e| {
            if let PipelineEvent::ReportReady { length } = e {
                tracing::info!(chars = length, "Report complete");
            }
        })),
        on_error: Some(Arc::new(|e| {
            if let PipelineEvent::Error { message } = e {
                tracing::error!("{}", message);
            }
        })),
        ..Default::default()
    }
}
