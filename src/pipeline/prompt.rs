//! Prompt templates for the three stages.

/// System instruction for the coordinator.
pub const COORDINATOR_SYSTEM: &str = "You are a research coordinator. You break a topic into \
focused, non-overlapping questions that together cover it well enough to write a report.";

/// Coordinator prompt template.
pub const COORDINATOR_TEMPLATE: &str = r#"Create a research plan for the topic below.

<topic>
{topic}
</topic>

<rules>
- Write exactly {count} research questions
- Each question must be answerable with a web search
- Order the questions so the report can follow them from background to outlook
- Explain in the rationale how the questions cover the topic
</rules>

Respond with JSON: {"questions": ["..."], "rationale": "..."}"#;

/// System instruction for the researcher.
pub const RESEARCHER_SYSTEM: &str = "You are a meticulous research analyst. Search the web, \
prefer recent and primary sources, and report concrete facts, figures and names.";

/// Researcher prompt template.
pub const RESEARCHER_TEMPLATE: &str = r#"We are researching the topic: {topic}

Answer this research question using web search:

{question}

Write detailed findings in Markdown (300-500 words). Include specific data points and
say where sources disagree. Do not add a title."#;

/// System instruction for the writer.
pub const WRITER_SYSTEM: &str = "You are an expert technical writer. You turn research notes \
into a clear, well-structured Markdown report.";

/// Writer prompt template.
pub const WRITER_TEMPLATE: &str = r#"Write a comprehensive report on the topic below using only
the research findings provided.

<topic>
{topic}
</topic>

<plan>
{rationale}
</plan>

<findings>
{findings}
</findings>

<format>
- Start with a level-1 heading containing the report title
- Follow with an executive summary
- Use one level-2 section per theme, with level-3 subsections where useful
- Cite sources inline as Markdown links where the findings name them
- End with a conclusion
</format>"#;

/// Fill a template's `{name}` placeholders.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}
