//! Docker API wrapper using the bollard crate.
//!
//! [`ContainerBackend`] is the seam between the sandbox lifecycle logic and
//! the Docker API: the runner drives the trait, [`DockerClient`] implements
//! it against the local daemon, and tests implement it with in-memory
//! doubles.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;

use crate::error::SandboxError;
use crate::sandbox::resources::ExecutionLimits;

/// Specification for a sandbox container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Unique name for the container.
    pub name: String,
    /// Docker image to use.
    pub image: String,
    /// Command to run in the container.
    pub cmd: Vec<String>,
    /// Volume binds (host:container format).
    pub binds: Vec<String>,
    /// Resource limits for the container.
    pub limits: ExecutionLimits,
    /// Network mode (e.g., "none", "bridge", "host").
    pub network_mode: Option<String>,
}

impl ContainerSpec {
    /// Creates a new container spec with the given name and image.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            cmd: Vec::new(),
            binds: Vec::new(),
            limits: ExecutionLimits::default(),
            network_mode: Some("bridge".to_string()),
        }
    }

    /// Sets the command to run in the container.
    pub fn with_cmd(mut self, cmd: Vec<String>) -> Self {
        self.cmd = cmd;
        self
    }

    /// Adds a volume bind in host:container format.
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.binds.push(bind.into());
        self
    }

    /// Sets explicit resource limits.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the network mode.
    pub fn with_network_mode(mut self, mode: impl Into<String>) -> Self {
        self.network_mode = Some(mode.into());
        self
    }
}

/// Container operations needed by the sandbox runner.
///
/// Implementations must tolerate `remove_container` on an already-running
/// container (force removal) and report a missing container as
/// [`SandboxError::ContainerNotFound`].
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Checks if an image exists locally. This is a lookup, never a pull.
    async fn image_exists(&self, image: &str) -> bool;

    /// Looks up a container by name, returning its id if present.
    async fn find_container(&self, name: &str) -> Result<Option<String>, SandboxError>;

    /// Creates a container and returns its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError>;

    /// Starts a created container.
    async fn start_container(&self, id: &str) -> Result<(), SandboxError>;

    /// Blocks until the container's process terminates; returns its exit code.
    async fn wait_container(&self, id: &str) -> Result<i64, SandboxError>;

    /// Retrieves one of the container's output streams as decoded text.
    ///
    /// Exactly one of `stdout`/`stderr` should be set; the streams are
    /// never merged.
    async fn container_logs(
        &self,
        id: &str,
        stdout: bool,
        stderr: bool,
    ) -> Result<String, SandboxError>;

    /// Forcibly removes a container (by id or name), killing it if running.
    async fn remove_container(&self, id: &str) -> Result<(), SandboxError>;
}

/// Docker client wrapper for sandbox container operations.
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Creates a new Docker client connecting to the local Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::DaemonUnavailable` if the Docker daemon is not
    /// accessible.
    pub fn new() -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::DaemonUnavailable(format!("Failed to connect: {e}")))?;

        Ok(Self { docker })
    }

    /// Creates a new client from an existing bollard Docker instance.
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerBackend for DockerClient {
    async fn image_exists(&self, image: &str) -> bool {
        self.docker.inspect_image(image).await.is_ok()
    }

    async fn find_container(&self, name: &str) -> Result<Option<String>, SandboxError> {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => Ok(Some(info.id.unwrap_or_else(|| name.to_string()))),
            Err(e) if e.to_string().contains("No such container") => Ok(None),
            Err(e) => Err(SandboxError::RunFailed(format!(
                "Failed to inspect container: {e}"
            ))),
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let host_config = HostConfig {
            memory: Some(spec.limits.memory_bytes()),
            cpu_period: Some(spec.limits.cpu_period()),
            cpu_quota: Some(spec.limits.cpu_quota()),
            network_mode: spec.network_mode.clone(),
            binds: if spec.binds.is_empty() {
                None
            } else {
                Some(spec.binds.clone())
            },
            ..Default::default()
        };

        let container_config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            host_config: Some(host_config),
            // No TTY: a pseudo-terminal would merge the two output streams,
            // and the caller needs them separately.
            tty: Some(false),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| SandboxError::CreateFailed(e.to_string()))?;

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), SandboxError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| SandboxError::RunFailed(format!("Failed to start container: {e}")))?;

        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<i64, SandboxError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(id, Some(options));

        if let Some(result) = stream.next().await {
            let wait_response = result.map_err(|e| {
                SandboxError::RunFailed(format!("Error waiting for container: {e}"))
            })?;

            return Ok(wait_response.status_code);
        }

        Err(SandboxError::RunFailed(
            "Container did not exit normally".to_string(),
        ))
    }

    async fn container_logs(
        &self,
        id: &str,
        stdout: bool,
        stderr: bool,
    ) -> Result<String, SandboxError> {
        let options = LogsOptions::<String> {
            stdout,
            stderr,
            follow: false,
            timestamps: false,
            ..Default::default()
        };

        let mut logs = self.docker.logs(id, Some(options));
        let mut output = String::new();

        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(SandboxError::RunFailed(format!("Error reading logs: {e}")));
                }
            }
        }

        Ok(output)
    }

    async fn remove_container(&self, id: &str) -> Result<(), SandboxError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true, // Remove anonymous volumes
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| {
                if e.to_string().contains("No such container") {
                    SandboxError::ContainerNotFound { id: id.to_string() }
                } else {
                    SandboxError::RunFailed(format!("Failed to remove container: {e}"))
                }
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_spec_builder() {
        let spec = ContainerSpec::new("tableqa-sandbox-1", "python:3.11-slim")
            .with_cmd(vec![
                "python".to_string(),
                "-c".to_string(),
                "print(1)".to_string(),
            ])
            .with_bind("/host/workspace:/workspace")
            .with_limits(ExecutionLimits::new(2048, 2.0, 600))
            .with_network_mode("none");

        assert_eq!(spec.name, "tableqa-sandbox-1");
        assert_eq!(spec.image, "python:3.11-slim");
        assert_eq!(spec.cmd.len(), 3);
        assert_eq!(spec.binds, vec!["/host/workspace:/workspace".to_string()]);
        assert_eq!(spec.limits.memory_mb, 2048);
        assert_eq!(spec.network_mode.unwrap(), "none");
    }

    #[test]
    fn test_container_spec_defaults() {
        let spec = ContainerSpec::new("s", "img");
        assert!(spec.cmd.is_empty());
        assert!(spec.binds.is_empty());
        assert_eq!(spec.network_mode.as_deref(), Some("bridge"));
    }
}
