use crate::error::ErrorCode;

/// Why a worker process did not produce a value
#[derive(Debug, thiserror::Error)]
pub enum WorkerProcessError {
    #[error("Failed to start worker process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker process exited without replying ({status}){}", stderr_suffix(.stderr))]
    Crashed { status: String, stderr: String },

    #[error("Malformed worker message: {message}")]
    Protocol { message: String },

    #[error("Worker task failed: {message}")]
    Task { message: String },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl WorkerProcessError {
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Spawn { .. } => ErrorCode::WORKER_SPAWN_FAILED,
            Self::Io { .. } => ErrorCode::WORKER_IO_ERROR,
            Self::Crashed { .. } => ErrorCode::WORKER_CRASHED,
            Self::Protocol { .. } => ErrorCode::WORKER_PROTOCOL_ERROR,
            Self::Task { .. } => ErrorCode::WORKER_TASK_FAILED,
        }
    }
}
