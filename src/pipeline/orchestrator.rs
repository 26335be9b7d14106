//! Three-stage analysis orchestrator.
//!
//! Drives the fixed scrape → clean → analyze sequence. Each stage asks the
//! generator for a script, strips code fences, runs the script in the
//! sandbox, and then judges the stage by two signals only: the script's
//! stderr and the presence of its expected workspace artifact. The first
//! failing stage aborts the pipeline; there are no retries.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::error::LlmError;
use crate::llm::CodeGenerator;
use crate::sandbox::{CodeExecutor, ExecutionRequest, ExecutionResult};
use crate::utils::{parse_answer_payload, strip_code_fences, AnswerParseError};
use crate::workspace::{Workspace, CLEAN_CSV_FILE, SCRAPED_TABLE_FILE};
use crate::prompts;

use super::config::ConfigError;

/// Errors that can occur while running the analysis pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Code generation failed.
    #[error("Code generation failed: {0}")]
    Llm(#[from] LlmError),

    /// A stage's script failed or did not produce its expected artifact.
    #[error("{stage} failed: {reason}")]
    StageFailed {
        stage: &'static str,
        reason: String,
    },

    /// The analysis stage's stdout was not a single-line JSON array.
    #[error("Failed to parse the final answer: {0}")]
    MalformedAnswer(#[from] AnswerParseError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One generate-then-execute step of the fixed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Download the page and save the raw table HTML.
    Scrape,
    /// Parse and clean the table into a CSV.
    Clean,
    /// Answer the question from the CSV.
    Analyze,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Scrape, Stage::Clean, Stage::Analyze];

    /// Human-readable stage label used in error messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Scrape => "stage 1 (scrape)",
            Stage::Clean => "stage 2 (clean)",
            Stage::Analyze => "stage 3 (analyze)",
        }
    }

    /// Workspace file this stage must produce, if any.
    ///
    /// The analyze stage signals through stdout instead.
    pub fn expected_artifact(&self) -> Option<&'static str> {
        match self {
            Stage::Scrape => Some(SCRAPED_TABLE_FILE),
            Stage::Clean => Some(CLEAN_CSV_FILE),
            Stage::Analyze => None,
        }
    }

    /// Builds this stage's task description.
    fn task(&self, target_url: &str, question: &str) -> String {
        match self {
            Stage::Scrape => prompts::scrape_task(target_url),
            Stage::Clean => prompts::clean_task(),
            Stage::Analyze => prompts::analyze_task(question),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Orchestrates the three-stage question-answering pipeline.
pub struct AnalysisOrchestrator {
    generator: Arc<dyn CodeGenerator>,
    executor: Arc<dyn CodeExecutor>,
    workspace: Workspace,
    target_url: String,
}

impl AnalysisOrchestrator {
    /// Creates an orchestrator over a generator, an executor, and a
    /// validated workspace.
    pub fn new(
        generator: Arc<dyn CodeGenerator>,
        executor: Arc<dyn CodeExecutor>,
        workspace: Workspace,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            executor,
            workspace,
            target_url: target_url.into(),
        }
    }

    /// Answers the question, returning the final JSON array.
    ///
    /// # Errors
    ///
    /// Returns a stage-labeled `PipelineError` as soon as any stage fails;
    /// later stages are not invoked.
    pub async fn answer(&self, question: &str) -> Result<serde_json::Value, PipelineError> {
        // Stage checks must see only this run's files.
        self.workspace
            .clear_artifacts(&[SCRAPED_TABLE_FILE, CLEAN_CSV_FILE])?;

        let mut final_stdout = String::new();

        for stage in Stage::ALL {
            info!(stage = stage.label(), "starting pipeline stage");

            let task = stage.task(&self.target_url, question);
            let response = self.generator.generate_code(&task).await?;
            let code = strip_code_fences(&response);

            let request = ExecutionRequest::new(code, self.workspace.root());
            let result = self.executor.execute(request).await;

            self.check_stage(stage, &result)?;

            info!(
                stage = stage.label(),
                exit_code = result.exit_code,
                "pipeline stage finished"
            );
            final_stdout = result.stdout;
        }

        let answer = parse_answer_payload(&final_stdout)?;
        info!("analysis pipeline completed");
        Ok(answer)
    }

    /// Judges one stage's outcome.
    ///
    /// Any stderr output fails the stage, even on exit code 0: generated
    /// scripts have no business writing there, and a warning is
    /// indistinguishable from a partial failure without inspecting the
    /// data. Runner-internal failures arrive with their description in
    /// stderr and are caught by the same check.
    fn check_stage(&self, stage: Stage, result: &ExecutionResult) -> Result<(), PipelineError> {
        if !result.stderr.trim().is_empty() {
            error!(
                stage = stage.label(),
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "stage script reported errors"
            );
            return Err(PipelineError::StageFailed {
                stage: stage.label(),
                reason: format!("script error: {}", truncate(result.stderr.trim(), 500)),
            });
        }

        if let Some(artifact) = stage.expected_artifact() {
            if !self.workspace.has_artifact(artifact) {
                error!(
                    stage = stage.label(),
                    artifact, "stage did not produce its expected output file"
                );
                return Err(PipelineError::StageFailed {
                    stage: stage.label(),
                    reason: format!("expected output file '{artifact}' was not created"),
                });
            }
        }

        Ok(())
    }
}

/// Truncates a string for inclusion in an error message.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
