//! The three-stage analysis pipeline.
//!
//! The orchestrator sequences scrape → clean → analyze, passing state
//! between stages through workspace files rather than in-memory values;
//! only the final stage's stdout carries the answer.

pub mod config;
pub mod orchestrator;

pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{AnalysisOrchestrator, PipelineError, Stage};
