//! Sandboxed execution of untrusted generated code.
//!
//! # Architecture
//!
//! Each invocation walks one container through this lifecycle:
//!
//! ```text
//! IDLE → RECLAIMING_STALE → PROVISIONING → RUNNING → COLLECTING → DESTROYING
//! ```
//!
//! `DESTROYING` runs unconditionally once provisioning has been attempted,
//! including after failures, so a container is never leaked across runs.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tableqa::sandbox::{CodeExecutor, DockerClient, ExecutionRequest, SandboxRunner};
//!
//! let docker = Arc::new(DockerClient::new()?);
//! let runner = SandboxRunner::new(docker, "tableqa-runner:latest");
//! let result = runner
//!     .execute(ExecutionRequest::new("print('hello')", "/abs/workspace"))
//!     .await;
//! assert_eq!(result.exit_code, 0);
//! ```

pub mod docker_client;
pub mod resources;
pub mod runner;

pub use docker_client::{ContainerBackend, ContainerSpec, DockerClient};
pub use resources::ExecutionLimits;
pub use runner::{
    CodeExecutor, ExecutionRequest, ExecutionResult, SandboxRunner, RUNNER_FAILURE_EXIT_CODE,
};
