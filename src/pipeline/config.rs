//! Pipeline configuration.
//!
//! All knobs are resolved once at startup: the sandbox image and resource
//! limits, the workspace base directory, the scrape target, and the HTTP
//! port. Environment variables override defaults; validation rejects
//! configurations the pipeline could not run with.

use std::path::PathBuf;
use thiserror::Error;

use crate::sandbox::ExecutionLimits;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while resolving configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Sandbox settings
    /// Docker image the generated scripts run in. Must be present locally.
    pub docker_image: String,
    /// Prefix for per-invocation sandbox container names.
    pub container_prefix: String,
    /// Memory limit for sandbox containers (in MB).
    pub sandbox_memory_mb: u64,
    /// CPU cores allocated to sandbox containers.
    pub sandbox_cpu_cores: f64,
    /// Seconds before a sandboxed script is forcibly terminated.
    pub sandbox_timeout_secs: u64,

    // Pipeline settings
    /// Host directory shared with the sandbox containers.
    pub workspace_dir: PathBuf,
    /// Page holding the table the pipeline scrapes.
    pub target_url: String,
    /// Sampling temperature for code generation.
    pub temperature: f64,

    // Server settings
    /// Port for the HTTP API.
    pub port: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            docker_image: "tableqa-runner:latest".to_string(),
            container_prefix: "tableqa-sandbox".to_string(),
            sandbox_memory_mb: 1024,
            sandbox_cpu_cores: 1.0,
            sandbox_timeout_secs: 300,

            workspace_dir: PathBuf::from("./workspace"),
            target_url: "https://en.wikipedia.org/wiki/List_of_highest-grossing_films"
                .to_string(),
            temperature: 0.2,

            port: 8000,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TABLEQA_DOCKER_IMAGE`: Sandbox image (default: tableqa-runner:latest)
    /// - `TABLEQA_CONTAINER_PREFIX`: Container name prefix (default: tableqa-sandbox)
    /// - `TABLEQA_SANDBOX_MEMORY_MB`: Sandbox memory limit (default: 1024)
    /// - `TABLEQA_SANDBOX_CPU_CORES`: Sandbox CPU cores (default: 1.0)
    /// - `TABLEQA_SANDBOX_TIMEOUT_SECS`: Script timeout in seconds (default: 300)
    /// - `TABLEQA_WORKSPACE_DIR`: Shared workspace directory (default: ./workspace)
    /// - `TABLEQA_TARGET_URL`: Page to scrape
    /// - `TABLEQA_TEMPERATURE`: Code-generation temperature (default: 0.2)
    /// - `TABLEQA_PORT`: HTTP API port (default: 8000)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TABLEQA_DOCKER_IMAGE") {
            config.docker_image = val;
        }

        if let Ok(val) = std::env::var("TABLEQA_CONTAINER_PREFIX") {
            config.container_prefix = val;
        }

        if let Ok(val) = std::env::var("TABLEQA_SANDBOX_MEMORY_MB") {
            config.sandbox_memory_mb = parse_env_value(&val, "TABLEQA_SANDBOX_MEMORY_MB")?;
        }

        if let Ok(val) = std::env::var("TABLEQA_SANDBOX_CPU_CORES") {
            config.sandbox_cpu_cores = parse_env_value(&val, "TABLEQA_SANDBOX_CPU_CORES")?;
        }

        if let Ok(val) = std::env::var("TABLEQA_SANDBOX_TIMEOUT_SECS") {
            config.sandbox_timeout_secs = parse_env_value(&val, "TABLEQA_SANDBOX_TIMEOUT_SECS")?;
        }

        if let Ok(val) = std::env::var("TABLEQA_WORKSPACE_DIR") {
            config.workspace_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("TABLEQA_TARGET_URL") {
            config.target_url = val;
        }

        if let Ok(val) = std::env::var("TABLEQA_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "TABLEQA_TEMPERATURE")?;
        }

        if let Ok(val) = std::env::var("TABLEQA_PORT") {
            config.port = parse_env_value(&val, "TABLEQA_PORT")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.docker_image.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "docker_image cannot be empty".to_string(),
            ));
        }

        if self.container_prefix.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "container_prefix cannot be empty".to_string(),
            ));
        }

        if self.sandbox_memory_mb < 256 {
            return Err(ConfigError::ValidationFailed(
                "sandbox_memory_mb must be at least 256 MB".to_string(),
            ));
        }

        if self.sandbox_cpu_cores <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "sandbox_cpu_cores must be greater than 0".to_string(),
            ));
        }

        if self.sandbox_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "sandbox_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.target_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "target_url cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the sandbox resource limits this configuration describes.
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits::new(
            self.sandbox_memory_mb,
            self.sandbox_cpu_cores,
            self.sandbox_timeout_secs,
        )
    }

    /// Builder method to set the sandbox image.
    pub fn with_docker_image(mut self, image: impl Into<String>) -> Self {
        self.docker_image = image.into();
        self
    }

    /// Builder method to set the container name prefix.
    pub fn with_container_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.container_prefix = prefix.into();
        self
    }

    /// Builder method to set the sandbox memory limit.
    pub fn with_sandbox_memory_mb(mut self, memory: u64) -> Self {
        self.sandbox_memory_mb = memory;
        self
    }

    /// Builder method to set the sandbox CPU cores.
    pub fn with_sandbox_cpu_cores(mut self, cores: f64) -> Self {
        self.sandbox_cpu_cores = cores;
        self
    }

    /// Builder method to set the script timeout.
    pub fn with_sandbox_timeout_secs(mut self, secs: u64) -> Self {
        self.sandbox_timeout_secs = secs;
        self
    }

    /// Builder method to set the workspace directory.
    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    /// Builder method to set the scrape target URL.
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = url.into();
        self
    }

    /// Builder method to set the generation temperature.
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    /// Builder method to set the HTTP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
