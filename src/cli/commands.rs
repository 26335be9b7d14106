//! CLI command definitions for tableqa.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::llm::{CodeGenerator, LiteLlmClient, ScriptGenerator};
use crate::pipeline::{AnalysisOrchestrator, PipelineConfig};
use crate::sandbox::{CodeExecutor, ContainerBackend, DockerClient, SandboxRunner};
use crate::server::{self, AppState};
use crate::workspace::Workspace;

/// Answer ad-hoc questions about a web-scraped table with LLM-generated,
/// sandboxed Python scripts.
#[derive(Parser)]
#[command(name = "tableqa")]
#[command(about = "LLM-driven data analysis over sandboxed script execution")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve(ServeArgs),

    /// Answer a question from a file and print the JSON result.
    Ask(AskArgs),

    /// Check that the Docker daemon is reachable and the execution image is present.
    Check,
}

/// Arguments for `tableqa serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides TABLEQA_PORT).
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for `tableqa ask`.
#[derive(Parser, Debug)]
pub struct AskArgs {
    /// File whose contents are the analysis question.
    pub question_file: String,
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the command selected by the parsed CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;

    match cli.command {
        Commands::Serve(args) => {
            let port = args.port.unwrap_or(config.port);
            let orchestrator = build_orchestrator(&config)?;
            let state = Arc::new(AppState { orchestrator });
            server::serve(port, state).await
        }

        Commands::Ask(args) => {
            let question = std::fs::read_to_string(&args.question_file)?;
            let orchestrator = build_orchestrator(&config)?;
            let answer = orchestrator.answer(question.trim()).await?;
            println!("{}", serde_json::to_string(&answer)?);
            Ok(())
        }

        Commands::Check => {
            let docker = DockerClient::new()?;
            if docker.image_exists(&config.docker_image).await {
                info!(image = %config.docker_image, "execution image is available");
                println!("ok: image '{}' is available", config.docker_image);
                Ok(())
            } else {
                anyhow::bail!(
                    "execution image '{}' not found locally; build or pull it first",
                    config.docker_image
                )
            }
        }
    }
}

/// Wires the production generator, sandbox runner, and workspace together.
fn build_orchestrator(config: &PipelineConfig) -> anyhow::Result<AnalysisOrchestrator> {
    let client = LiteLlmClient::from_env()?;
    let generator: Arc<dyn CodeGenerator> = Arc::new(
        ScriptGenerator::new(Box::new(client)).with_temperature(config.temperature),
    );

    let docker = DockerClient::new()?;
    let executor: Arc<dyn CodeExecutor> = Arc::new(
        SandboxRunner::new(Arc::new(docker), &config.docker_image)
            .with_name_prefix(&config.container_prefix)
            .with_limits(config.limits()),
    );

    let workspace = Workspace::new(&config.workspace_dir)?;

    Ok(AnalysisOrchestrator::new(
        generator,
        executor,
        workspace,
        config.target_url.clone(),
    ))
}
