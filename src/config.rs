//! Coordinator configuration
//!
//! Everything here has a working default, so a configuration file only needs
//! the fields it wants to change:
//!
//! ```toml
//! default_worker_count = 8
//! failure_policy = "abandon_siblings"
//!
//! [worker]
//! program = "/usr/local/bin/mapreduce-worker"
//! args = []
//!
//! [worker.env]
//! RUST_LOG = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::channel::WorkerCommand;
use crate::coordinator::Coordinator;
use crate::error::ConfigError;

/// What happens to map workers still running when a sibling fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Kill in-flight workers as soon as the call fails
    #[default]
    TerminateSiblings,
    /// Leave in-flight workers to finish and exit on their own
    AbandonSiblings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub worker: WorkerCommand,
    /// Overrides the host's available parallelism as the default worker count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_worker_count: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker: WorkerCommand::bundled(),
            default_worker_count: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded coordinator configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.program.trim().is_empty() {
            return Err(ConfigError::invalid("worker.program", "must not be empty"));
        }

        if self.default_worker_count == Some(0) {
            return Err(ConfigError::invalid(
                "default_worker_count",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Fluent construction of a [`Coordinator`] from configuration pieces
#[derive(Debug, Clone, Default)]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    pub fn worker(mut self, command: WorkerCommand) -> Self {
        self.config.worker = command;
        self
    }

    pub fn default_worker_count(mut self, worker_count: usize) -> Self {
        self.config.default_worker_count = Some(worker_count);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn build(self) -> Result<Coordinator, ConfigError> {
        Coordinator::from_config(&self.config)
    }
}
