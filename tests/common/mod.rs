//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use parallel_mapreduce::channel::{ChunkRunner, ProcessChannelRunner, WorkerCommand, WorkerProcessError};
use parallel_mapreduce::{ChunkRequest, Coordinator};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The worker binary built alongside these tests
pub fn worker_command() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_mapreduce-worker"))
}

/// Wraps the real process runner and counts every worker it starts
#[derive(Clone)]
pub struct CountingRunner {
    inner: ProcessChannelRunner,
    spawned: Arc<AtomicUsize>,
}

impl CountingRunner {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            inner: ProcessChannelRunner::new(command),
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkRunner for CountingRunner {
    async fn run(&self, request: ChunkRequest) -> Result<Value, WorkerProcessError> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.run(request).await
    }
}

/// A coordinator over real worker processes, plus its spawn counter
pub fn process_coordinator() -> (Coordinator, CountingRunner) {
    let runner = CountingRunner::new(worker_command());
    let coordinator = Coordinator::new(Arc::new(runner.clone()));
    (coordinator, runner)
}

pub fn sample_data() -> Vec<Value> {
    [4, 2, 6, 8, 5, 3, 2, 5, 3, 9, 5, 6, 7, 4, 3, 2]
        .into_iter()
        .map(|n| json!(n))
        .collect()
}
