//! Worker executor: the body of a single-use worker process.
//!
//! A worker reads exactly one [`ChunkRequest`], resolves its work unit in the
//! local [`TaskRegistry`], runs it, writes exactly one [`WorkerReply`], and
//! returns so the process can exit. A task that panics takes the process down
//! without a reply, which the coordinator observes as a crash.

use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error};

use crate::protocol::{self, ChunkRequest, WorkerReply, WORKER_FLAG};
use crate::task::TaskRegistry;

/// Lifecycle of one worker process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Executing,
    Terminated,
    Crashed,
}

/// How the worker finished, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Replied with a value
    Success,
    /// Replied with the task's error
    TaskFailed,
    /// No request, or one that could not be decoded
    BadRequest,
    /// The reply could not be written
    ReplyFailed,
}

impl WorkerExit {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::TaskFailed => 1,
            Self::BadRequest => 2,
            Self::ReplyFailed => 3,
        }
    }

    pub fn final_state(self) -> WorkerState {
        match self {
            Self::Success => WorkerState::Terminated,
            _ => WorkerState::Crashed,
        }
    }
}

impl From<WorkerExit> for ExitCode {
    fn from(exit: WorkerExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// True when the current process was started with the worker marker argument
pub fn is_worker_invocation() -> bool {
    std::env::args().skip(1).any(|arg| arg == WORKER_FLAG)
}

/// Serve one request over this process's stdin/stdout.
pub async fn serve_stdio(registry: &TaskRegistry) -> ExitCode {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    run_worker(registry, stdin, stdout).await.into()
}

/// Read one request from `reader`, execute it, write one reply to `writer`.
pub async fn run_worker<R, W>(registry: &TaskRegistry, mut reader: R, mut writer: W) -> WorkerExit
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut state = WorkerState::Idle;
    debug!("Worker state: {:?}", state);

    let (reply, exit) = match read_request(&mut reader).await {
        Ok(request) => {
            state = WorkerState::Executing;
            debug!(
                "Worker executing chunk {} with task '{}' ({} inputs)",
                request.id,
                request.work_unit,
                request.inputs.len()
            );
            debug!("Worker state: {:?}", state);

            match registry.execute(&request.work_unit, request.inputs) {
                Ok(value) => (WorkerReply::Ok { value }, WorkerExit::Success),
                Err(e) => {
                    error!("Task '{}' failed on chunk {}: {}", request.work_unit, request.id, e);
                    (
                        WorkerReply::Error {
                            message: e.to_string(),
                        },
                        WorkerExit::TaskFailed,
                    )
                }
            }
        }
        Err(message) => {
            error!("Worker received a bad request: {}", message);
            (WorkerReply::Error { message }, WorkerExit::BadRequest)
        }
    };

    let exit = match write_reply(&mut writer, &reply).await {
        Ok(()) => exit,
        Err(e) => {
            error!("Failed to send worker reply: {}", e);
            WorkerExit::ReplyFailed
        }
    };

    state = exit.final_state();
    debug!("Worker state: {:?}", state);
    exit
}

async fn read_request<R>(reader: &mut R) -> Result<ChunkRequest, String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => Err("no request received".to_string()),
        Ok(_) => protocol::decode_line(&line).map_err(|e| format!("malformed request: {}", e)),
        Err(e) => Err(format!("failed to read request: {}", e)),
    }
}

async fn write_reply<W>(writer: &mut W, reply: &WorkerReply) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = protocol::encode_line(reply)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
