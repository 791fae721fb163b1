use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

use crate::channel::WorkerProcessError;
use crate::coordinator::Phase;

/// Result alias used across the coordinator-facing API
pub type Result<T> = std::result::Result<T, MapReduceError>;

/// The error surfaced by every `map_reduce` call.
///
/// The first failure in either phase is returned unchanged; there is no
/// partial-success variant.
#[derive(Error, Debug)]
pub enum MapReduceError {
    #[error("Data is empty")]
    EmptyInput,

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("{phase} worker {chunk_id} failed: {source}")]
    WorkerProcess {
        phase: Phase,
        chunk_id: u32,
        #[source]
        source: WorkerProcessError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MapReduceError {
    /// Wrap a worker failure with the phase and chunk it came from
    pub fn worker(phase: Phase, chunk_id: u32, source: WorkerProcessError) -> Self {
        Self::WorkerProcess {
            phase,
            chunk_id,
            source,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::EmptyInput => ErrorCode::INPUT_EMPTY,
            Self::Partition(_) => ErrorCode::PARTITION_INVALID_WORKER_COUNT,
            Self::WorkerProcess { source, .. } => source.code(),
            Self::Config(err) => err.code(),
            Self::Serialization(_) => ErrorCode::SERIALIZATION_ERROR,
        }
    }

    /// The underlying worker failure, if this error came from a worker
    pub fn worker_error(&self) -> Option<&WorkerProcessError> {
        match self {
            Self::WorkerProcess { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The phase that failed, if a worker failed
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::WorkerProcess { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Get a developer-friendly error message with code and description
    pub fn developer_message(&self) -> String {
        let code = self.code();
        format!("[E{:04}] {}: {}", code, describe_error_code(code), self)
    }
}

/// Partitioning rejects a worker count that cannot hold any chunk
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Invalid worker count {0}: expected between 1 and 4294967295")]
    InvalidWorkerCount(usize),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => ErrorCode::CONFIG_NOT_FOUND,
            Self::Io { .. } => ErrorCode::CONFIG_GENERIC,
            Self::Parse(_) => ErrorCode::CONFIG_PARSE_ERROR,
            Self::InvalidValue { .. } => ErrorCode::CONFIG_INVALID_VALUE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_empty_input_message_is_exact() {
        let err = MapReduceError::EmptyInput;
        assert_eq!(err.to_string(), "Data is empty");
        assert_eq!(err.code(), ErrorCode::INPUT_EMPTY);
        assert!(err.worker_error().is_none());
    }

    #[test]
    fn test_partition_error_is_transparent() {
        let err = MapReduceError::from(PartitionError::InvalidWorkerCount(0));
        assert_eq!(
            err.to_string(),
            "Invalid worker count 0: expected between 1 and 4294967295"
        );
        assert_eq!(err.code(), ErrorCode::PARTITION_INVALID_WORKER_COUNT);
    }

    #[test]
    fn test_worker_error_preserves_source_message() {
        let err = MapReduceError::worker(
            Phase::Map,
            3,
            WorkerProcessError::Task {
                message: "boom".to_string(),
            },
        );

        assert_eq!(err.phase(), Some(Phase::Map));
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().starts_with("map worker 3 failed"));
        let source = err.source().expect("source should be preserved");
        assert_eq!(source.to_string(), "Worker task failed: boom");
        assert_eq!(err.code(), ErrorCode::WORKER_TASK_FAILED);
    }

    #[test]
    fn test_developer_message_includes_code() {
        let err = MapReduceError::EmptyInput;
        assert_eq!(
            err.developer_message(),
            "[E1001] Input collection is empty: Data is empty"
        );
    }

    #[test]
    fn test_config_error_codes() {
        let err = ConfigError::invalid("worker.program", "must not be empty");
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'worker.program': must not be empty"
        );
    }
}
