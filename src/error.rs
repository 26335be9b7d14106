//! Error types for tableqa operations.
//!
//! Defines error types for the two subsystems that talk to the outside
//! world:
//! - Docker sandbox management
//! - LLM API interactions
//!
//! Pipeline and configuration errors live next to their owners in the
//! `pipeline` module.

use thiserror::Error;

/// Errors that can occur during sandbox operations.
///
/// These never escape [`crate::sandbox::SandboxRunner::execute`]; the runner
/// normalizes every variant into a failure `ExecutionResult`. They are
/// public so that backends and tests can construct and match them.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Execution image '{0}' not found locally; build or pull it before running")]
    ImageMissing(String),

    #[error("Invalid workspace path '{path}': {reason}")]
    InvalidWorkspace { path: String, reason: String },

    #[error("Failed to create container: {0}")]
    CreateFailed(String),

    #[error("Container run failed: {0}")]
    RunFailed(String),

    #[error("Container '{id}' not found")]
    ContainerNotFound { id: String },

    #[error("Execution timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
