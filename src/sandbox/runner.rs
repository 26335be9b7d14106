//! Sandbox runner: executes one untrusted code string to completion.
//!
//! This is the only component that touches generated code directly. It
//! provisions an ephemeral container bound to the shared workspace, runs
//! the code, collects both output streams, and guarantees the container is
//! destroyed afterward whatever happened in between. Every outcome,
//! including internal failures, is normalized into an [`ExecutionResult`];
//! `execute` never returns an error and never panics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::SandboxError;
use crate::sandbox::docker_client::{ContainerBackend, ContainerSpec};
use crate::sandbox::resources::ExecutionLimits;
use crate::workspace;

/// Exit code reserved for "the runner itself failed before or during
/// execution", as opposed to the executed code's own non-zero exit.
pub const RUNNER_FAILURE_EXIT_CODE: i64 = -1;

/// One untrusted code string bound to one workspace directory.
///
/// Immutable once created; the runner treats the code as an opaque blob and
/// performs no syntax validation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    code: String,
    workspace_path: PathBuf,
}

impl ExecutionRequest {
    /// Creates a new execution request.
    pub fn new(code: impl Into<String>, workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            code: code.into(),
            workspace_path: workspace_path.into(),
        }
    }

    /// The code to execute.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The host directory to mount into the sandbox.
    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }
}

/// Outcome of one sandboxed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The script's standard output, decoded as UTF-8.
    pub stdout: String,
    /// The script's standard error, decoded as UTF-8. Kept strictly
    /// separate from stdout.
    pub stderr: String,
    /// The script's exit code, or [`RUNNER_FAILURE_EXIT_CODE`].
    pub exit_code: i64,
}

impl ExecutionResult {
    /// Builds the normalized result for a failure inside the runner itself.
    pub fn runner_failure(description: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: description.into(),
            exit_code: RUNNER_FAILURE_EXIT_CODE,
        }
    }

    /// Returns true if the runner, not the executed code, failed.
    pub fn is_runner_failure(&self) -> bool {
        self.exit_code == RUNNER_FAILURE_EXIT_CODE
    }
}

/// Executes untrusted code strings against a workspace.
///
/// The orchestrator depends on this trait rather than on
/// [`SandboxRunner`] so that tests can substitute doubles.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Runs the request to completion and normalizes every outcome,
    /// including internal failures, into an [`ExecutionResult`].
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult;
}

/// Docker-backed sandbox runner.
///
/// Each invocation derives a fresh container name (`<prefix>-<uuid>`), so
/// concurrent runners never contend on a shared identity. A fixed name can
/// be pinned with [`with_container_name`](Self::with_container_name) for
/// callers that need a stable identity; a pinned runner must not execute
/// concurrently with itself, though sequential reuse is always safe because
/// of the stale-container reclaim step.
pub struct SandboxRunner {
    backend: Arc<dyn ContainerBackend>,
    image: String,
    name_prefix: String,
    pinned_name: Option<String>,
    limits: ExecutionLimits,
}

impl SandboxRunner {
    /// Creates a runner using the given backend and execution image.
    pub fn new(backend: Arc<dyn ContainerBackend>, image: impl Into<String>) -> Self {
        Self {
            backend,
            image: image.into(),
            name_prefix: "tableqa-sandbox".to_string(),
            pinned_name: None,
            limits: ExecutionLimits::default(),
        }
    }

    /// Sets the resource limits applied to each container.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the prefix used for generated container names.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Pins a fixed container name instead of generating one per run.
    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.pinned_name = Some(name.into());
        self
    }

    fn container_name(&self) -> String {
        match &self.pinned_name {
            Some(name) => name.clone(),
            None => format!("{}-{}", self.name_prefix, Uuid::new_v4()),
        }
    }

    /// Provisions, runs, and collects output from one container.
    ///
    /// Teardown is not handled here; `execute` removes the container on
    /// every exit path of this function.
    async fn run_to_completion(
        &self,
        request: &ExecutionRequest,
        name: &str,
    ) -> Result<ExecutionResult, SandboxError> {
        let ws = request.workspace_path();
        if !ws.is_absolute() {
            return Err(SandboxError::InvalidWorkspace {
                path: ws.display().to_string(),
                reason: "not an absolute path".to_string(),
            });
        }
        if !ws.is_dir() {
            return Err(SandboxError::InvalidWorkspace {
                path: ws.display().to_string(),
                reason: "not an existing directory".to_string(),
            });
        }

        // Availability check only; pulling would mask a misconfigured host.
        if !self.backend.image_exists(&self.image).await {
            return Err(SandboxError::ImageMissing(self.image.clone()));
        }

        // Reclaim a stale container left behind by a previous failed run.
        // Absence is the normal case and not an error.
        if let Some(stale) = self.backend.find_container(name).await? {
            info!(container = name, "removing stale sandbox container");
            self.backend.remove_container(&stale).await?;
        }

        // The code travels as a single argv element, so no shell quoting or
        // escaping applies. The size bound is the daemon's argument limit
        // (on the order of megabytes), far above any generated script.
        let spec = ContainerSpec::new(name, &self.image)
            .with_cmd(vec![
                "python".to_string(),
                "-c".to_string(),
                request.code().to_string(),
            ])
            .with_bind(format!("{}:{}", ws.display(), workspace::MOUNT_POINT))
            .with_limits(self.limits.clone());

        let id = self.backend.create_container(&spec).await?;
        self.backend.start_container(&id).await?;

        debug!(container = name, "waiting for sandboxed script");
        let wait = tokio::time::timeout(
            Duration::from_secs(self.limits.timeout_seconds),
            self.backend.wait_container(&id),
        )
        .await;
        let exit_code = match wait {
            Ok(result) => result?,
            Err(_) => {
                // The container keeps running past the deadline; the
                // unconditional teardown in `execute` kills it.
                return Err(SandboxError::Timeout {
                    seconds: self.limits.timeout_seconds,
                });
            }
        };

        let stdout = self.backend.container_logs(&id, true, false).await?;
        let stderr = self.backend.container_logs(&id, false, true).await?;

        debug!(
            container = name,
            exit_code,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "sandboxed script finished"
        );

        Ok(ExecutionResult {
            stdout,
            stderr,
            exit_code,
        })
    }
}

#[async_trait]
impl CodeExecutor for SandboxRunner {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let name = self.container_name();
        let outcome = self.run_to_completion(&request, &name).await;

        // Unconditional teardown, exactly once per invocation. A missing
        // container just means provisioning never got that far; any other
        // failure is logged and must not mask the primary outcome.
        match self.backend.remove_container(&name).await {
            Ok(()) => debug!(container = %name, "sandbox container removed"),
            Err(SandboxError::ContainerNotFound { .. }) => {}
            Err(e) => warn!(container = %name, error = %e, "sandbox teardown failed"),
        }

        match outcome {
            Ok(result) => result,
            Err(e) => {
                error!(container = %name, error = %e, "sandbox execution failed");
                ExecutionResult::runner_failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory container backend with counters for lifecycle assertions.
    struct MockBackend {
        image_present: bool,
        fail_create: bool,
        wait_seconds: u64,
        exit_code: i64,
        stdout: String,
        stderr: String,
        containers: Mutex<HashSet<String>>,
        remove_attempts: AtomicUsize,
        creates: AtomicUsize,
        events: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                image_present: true,
                fail_create: false,
                wait_seconds: 0,
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                containers: Mutex::new(HashSet::new()),
                remove_attempts: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
            }
        }

        fn log(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }
    }

    #[async_trait]
    impl ContainerBackend for MockBackend {
        async fn image_exists(&self, _image: &str) -> bool {
            self.image_present
        }

        async fn find_container(&self, name: &str) -> Result<Option<String>, SandboxError> {
            self.log("find");
            let containers = self.containers.lock().unwrap();
            Ok(containers.get(name).cloned())
        }

        async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
            self.log("create");
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(SandboxError::CreateFailed("daemon said no".to_string()));
            }
            let mut containers = self.containers.lock().unwrap();
            if !containers.insert(spec.name.clone()) {
                return Err(SandboxError::CreateFailed(format!(
                    "container name '{}' already exists",
                    spec.name
                )));
            }
            Ok(spec.name.clone())
        }

        async fn start_container(&self, _id: &str) -> Result<(), SandboxError> {
            self.log("start");
            Ok(())
        }

        async fn wait_container(&self, _id: &str) -> Result<i64, SandboxError> {
            self.log("wait");
            if self.wait_seconds > 0 {
                tokio::time::sleep(Duration::from_secs(self.wait_seconds)).await;
            }
            Ok(self.exit_code)
        }

        async fn container_logs(
            &self,
            _id: &str,
            stdout: bool,
            _stderr: bool,
        ) -> Result<String, SandboxError> {
            self.log("logs");
            if stdout {
                Ok(self.stdout.clone())
            } else {
                Ok(self.stderr.clone())
            }
        }

        async fn remove_container(&self, id: &str) -> Result<(), SandboxError> {
            self.log("remove");
            self.remove_attempts.fetch_add(1, Ordering::SeqCst);
            let mut containers = self.containers.lock().unwrap();
            if containers.remove(id) {
                Ok(())
            } else {
                Err(SandboxError::ContainerNotFound { id: id.to_string() })
            }
        }
    }

    fn runner_with(backend: Arc<MockBackend>) -> SandboxRunner {
        SandboxRunner::new(backend, "tableqa-runner:latest")
    }

    fn request_in(dir: &tempfile::TempDir) -> ExecutionRequest {
        ExecutionRequest::new("print('hello')", dir.path())
    }

    #[tokio::test]
    async fn test_success_returns_exact_streams() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = MockBackend::new();
        backend.stdout = "hello\n".to_string();
        let backend = Arc::new(backend);
        let runner = runner_with(backend.clone());

        let result = runner.execute(request_in(&dir)).await;

        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "");
        assert_eq!(result.exit_code, 0);
        // Teardown exactly once; no stale container existed.
        assert_eq!(backend.remove_attempts.load(Ordering::SeqCst), 1);
        assert!(backend.containers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_code_failure_is_reported_not_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = MockBackend::new();
        backend.exit_code = 2;
        backend.stderr = "Traceback (most recent call last)".to_string();
        let backend = Arc::new(backend);
        let runner = runner_with(backend.clone());

        let result = runner.execute(request_in(&dir)).await;

        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("Traceback"));
        assert!(!result.is_runner_failure());
        assert_eq!(backend.remove_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_image_never_raises() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = MockBackend::new();
        backend.image_present = false;
        let backend = Arc::new(backend);
        let runner = runner_with(backend.clone());

        let result = runner.execute(request_in(&dir)).await;

        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, RUNNER_FAILURE_EXIT_CODE);
        assert!(result.stderr.contains("tableqa-runner:latest"));
        assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
        // Teardown still attempted exactly once, harmlessly.
        assert_eq!(backend.remove_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_failure_normalized_with_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = MockBackend::new();
        backend.fail_create = true;
        let backend = Arc::new(backend);
        let runner = runner_with(backend.clone());

        let result = runner.execute(request_in(&dir)).await;

        assert!(result.is_runner_failure());
        assert!(result.stderr.contains("daemon said no"));
        assert_eq!(backend.remove_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_relative_workspace_rejected() {
        let backend = Arc::new(MockBackend::new());
        let runner = runner_with(backend.clone());

        let result = runner
            .execute(ExecutionRequest::new("print(1)", "relative/dir"))
            .await;

        assert!(result.is_runner_failure());
        assert!(result.stderr.contains("not an absolute path"));
        assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_container_reclaimed_before_create() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        // A previous run died without cleanup.
        backend
            .containers
            .lock()
            .unwrap()
            .insert("tableqa-fixed".to_string());

        let runner = runner_with(backend.clone()).with_container_name("tableqa-fixed");
        let result = runner.execute(request_in(&dir)).await;

        // The create must not have failed with "already exists".
        assert_eq!(result.exit_code, 0);
        let events = backend.events.lock().unwrap().clone();
        let reclaim = events.iter().position(|e| e == "remove").unwrap();
        let create = events.iter().position(|e| e == "create").unwrap();
        assert!(reclaim < create, "reclaim must precede create: {events:?}");
        // Reclaim plus final teardown.
        assert_eq!(backend.remove_attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sequential_runs_with_pinned_name() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let runner = runner_with(backend.clone()).with_container_name("tableqa-fixed");

        let first = runner.execute(request_in(&dir)).await;
        let second = runner.execute(request_in(&dir)).await;

        assert_eq!(first.exit_code, 0);
        assert_eq!(second.exit_code, 0);
        assert_eq!(backend.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_generated_names_are_unique() {
        let backend = Arc::new(MockBackend::new());
        let runner = runner_with(backend).with_name_prefix("tableqa-sandbox");

        let a = runner.container_name();
        let b = runner.container_name();

        assert!(a.starts_with("tableqa-sandbox-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_timeout_is_a_runner_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = MockBackend::new();
        backend.wait_seconds = 30;
        let backend = Arc::new(backend);
        let runner =
            runner_with(backend.clone()).with_limits(ExecutionLimits::new(1024, 1.0, 1));

        let result = runner.execute(request_in(&dir)).await;

        assert!(result.is_runner_failure());
        assert!(result.stderr.contains("timed out after 1 seconds"));
        // The hung container is force-removed by the teardown path.
        assert!(backend.containers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_runner_failure_result_shape() {
        let result = ExecutionResult::runner_failure("boom");
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "boom");
        assert_eq!(result.exit_code, RUNNER_FAILURE_EXIT_CODE);
        assert!(result.is_runner_failure());
    }
}
