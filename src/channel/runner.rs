use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout};

use super::command::WorkerCommand;
use super::error::WorkerProcessError;
use crate::protocol::{self, ChunkRequest, WorkerReply};

/// Tail of worker stderr kept for crash reports
const MAX_STDERR_BYTES: usize = 8 * 1024;

/// Runs one request in one isolated worker and yields its single result
#[async_trait]
pub trait ChunkRunner: Send + Sync {
    async fn run(&self, request: ChunkRequest) -> Result<Value, WorkerProcessError>;
}

/// A one-shot transport to a single worker process.
///
/// `run` consumes the channel, so an instance can carry exactly one request.
#[derive(Debug)]
pub struct ProcessChannel {
    command: WorkerCommand,
    kill_on_drop: bool,
}

impl ProcessChannel {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            kill_on_drop: true,
        }
    }

    /// Whether a worker still running when the channel future is dropped gets killed
    pub fn kill_on_drop(mut self, kill: bool) -> Self {
        self.kill_on_drop = kill;
        self
    }

    /// Spawn the worker, send `request`, and resolve with the first reply.
    pub async fn run(self, request: ChunkRequest) -> Result<Value, WorkerProcessError> {
        let start = Instant::now();
        let chunk_id = request.id;
        Self::log_command_start(&self.command, &request);

        let line = protocol::encode_line(&request)
            .map_err(|e| WorkerProcessError::protocol(format!("could not encode request: {}", e)))?;
        drop(request);

        let mut cmd = Self::configure_command(&self.command, self.kill_on_drop);
        let mut child = cmd.spawn().map_err(|source| WorkerProcessError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(Self::collect_stderr(stderr)));

        Self::write_request(&mut child, &line).await?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerProcessError::protocol("worker stdout was not captured"))?;

        match Self::read_reply_line(stdout).await? {
            Some(reply_line) => {
                Self::reap(child, chunk_id);
                let reply: WorkerReply = protocol::decode_line(&reply_line).map_err(|e| {
                    WorkerProcessError::protocol(format!("{} in reply {:?}", e, reply_line.trim_end()))
                })?;

                tracing::debug!(
                    "Worker for chunk {} replied in {:?}",
                    chunk_id,
                    start.elapsed()
                );
                reply
                    .into_result()
                    .map_err(|message| WorkerProcessError::Task { message })
            }
            None => {
                let status = child
                    .wait()
                    .await
                    .map_err(|e| WorkerProcessError::io("waiting for worker exit", e))?;
                let stderr = match stderr_task {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };

                tracing::warn!(
                    "Worker for chunk {} exited without replying: {}",
                    chunk_id,
                    status
                );
                Err(WorkerProcessError::Crashed {
                    status: status.to_string(),
                    stderr,
                })
            }
        }
    }

    fn log_command_start(command: &WorkerCommand, request: &ChunkRequest) {
        tracing::debug!(
            "Spawning worker '{}' for chunk {} (task '{}', {} inputs)",
            command.display(),
            request.id,
            request.work_unit,
            request.inputs.len()
        );

        if !command.env.is_empty() {
            tracing::trace!("Worker environment overrides: {:?}", command.env);
        }

        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }
    }

    fn configure_command(command: &WorkerCommand, kill_on_drop: bool) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(kill_on_drop);
        cmd
    }

    /// Deliver the request and close stdin so the worker sees EOF after one line.
    ///
    /// A broken pipe means the worker is already gone; that is reported as a
    /// crash once stdout reaches EOF rather than as an I/O failure here.
    async fn write_request(child: &mut Child, line: &str) -> Result<(), WorkerProcessError> {
        let Some(mut stdin) = child.stdin.take() else {
            return Err(WorkerProcessError::protocol("worker stdin was not captured"));
        };

        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await?;
            stdin.shutdown().await
        }
        .await;

        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!("Worker closed stdin before the request was delivered");
                Ok(())
            }
            Err(e) => Err(WorkerProcessError::io("sending request", e)),
        }
    }

    async fn read_reply_line(stdout: ChildStdout) -> Result<Option<String>, WorkerProcessError> {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line)),
            Err(e) => Err(WorkerProcessError::io("reading reply", e)),
        }
    }

    /// Drain `stderr` to EOF, keeping only its last `MAX_STDERR_BYTES` bytes.
    async fn collect_stderr<R: AsyncRead + Unpin>(mut stderr: R) -> String {
        let mut tail = Vec::with_capacity(MAX_STDERR_BYTES);
        let mut chunk = [0u8; 4096];
        loop {
            match stderr.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > MAX_STDERR_BYTES {
                        tail.drain(..tail.len() - MAX_STDERR_BYTES);
                    }
                }
                Err(e) => {
                    tracing::trace!("Could not read worker stderr: {}", e);
                    break;
                }
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    }

    /// The worker exits on its own after replying; wait for it in the background.
    fn reap(mut child: Child, chunk_id: u32) {
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::trace!("Worker for chunk {} exited", chunk_id)
                }
                Ok(status) => tracing::debug!(
                    "Worker for chunk {} exited after replying: {}",
                    chunk_id,
                    status
                ),
                Err(e) => tracing::debug!("Could not wait for worker {}: {}", chunk_id, e),
            }
        });
    }
}

/// Production runner: a fresh [`ProcessChannel`] per request
#[derive(Debug, Clone)]
pub struct ProcessChannelRunner {
    command: WorkerCommand,
    kill_on_drop: bool,
}

impl ProcessChannelRunner {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            kill_on_drop: true,
        }
    }

    pub fn kill_on_drop(mut self, kill: bool) -> Self {
        self.kill_on_drop = kill;
        self
    }
}

#[async_trait]
impl ChunkRunner for ProcessChannelRunner {
    async fn run(&self, request: ChunkRequest) -> Result<Value, WorkerProcessError> {
        ProcessChannel::new(self.command.clone())
            .kill_on_drop(self.kill_on_drop)
            .run(request)
            .await
    }
}
