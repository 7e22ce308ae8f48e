//! Delve CLI - research a topic and write a Markdown report.

use anyhow::Context as _;
use clap::Parser;
use delve::{GeminiClient, Pipeline, PipelineConfig, PipelineEvent, Settings, save_report};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Plan, research and write a Markdown report on any topic
#[derive(Parser, Debug)]
#[command(name = "delve", version, about, long_about = None)]
struct Cli {
    /// Topic to research (prompts interactively if omitted)
    #[arg(short, long)]
    topic: Option<String>,

    /// Where to write the report
    #[arg(short, long, default_value = "output/output.md")]
    output: PathBuf,

    /// Model to use for every stage
    #[arg(short, long)]
    model: Option<String>,

    /// Number of research questions
    #[arg(short = 'n', long)]
    questions: Option<usize>,

    /// Append a list of cited sources to the report
    #[arg(long)]
    sources: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let topic = match &cli.topic {
        Some(topic) => topic.clone(),
        None => prompt_topic(),
    };
    let topic = topic.trim().to_string();
    if topic.is_empty() {
        eprintln!("Error: a topic is required");
        return ExitCode::FAILURE;
    }

    if let Err(e) = run(&cli, &topic).await {
        eprintln!("\nError: {:#}", e);
    }
    ExitCode::SUCCESS
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,delve={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Ask for a topic on the terminal; an unreadable terminal counts as no topic.
fn prompt_topic() -> String {
    dialoguer::Input::<String>::new()
        .with_prompt("Research topic")
        .allow_empty(true)
        .interact_text()
        .unwrap_or_default()
}

async fn run(cli: &Cli, topic: &str) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if let Some(questions) = cli.questions {
        settings.questions = questions.max(1);
    }

    let pipeline = Pipeline::new(
        GeminiClient::lazy(settings.api.clone()),
        PipelineConfig::from(&settings),
    )
    .verbose(!cli.quiet)
    .on_token(|event| {
        if let PipelineEvent::Token { text } = event {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    });

    tracing::info!(topic, model = settings.model.as_str(), "Starting research");
    let report = pipeline.run(topic).await?;
    println!();

    save_report(&cli.output, &report.to_markdown(cli.sources))
        .await
        .with_context(|| format!("writing {}", cli.output.display()))?;
    tracing::info!(
        path = %cli.output.display(),
        questions = report.results.len(),
        sources = report.unique_sources().len(),
        "Report written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let cli = Cli::parse_from(["delve", "--topic", "rust"]);
        assert_eq!(cli.output, PathBuf::from("output/output.md"));
        assert_eq!(cli.topic.as_deref(), Some("rust"));
        assert!(!cli.sources);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "delve", "-t", "x", "-o", "r.md", "-m", "gemini-2.5-pro", "-n", "3", "-vv",
        ]);
        assert_eq!(cli.output, PathBuf::from("r.md"));
        assert_eq!(cli.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(cli.questions, Some(3));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
