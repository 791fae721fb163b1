use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::WorkerProcessError;
use super::runner::ChunkRunner;
use crate::protocol::ChunkRequest;
use crate::task::TaskRegistry;

/// In-process stand-in for worker processes.
///
/// Every request is recorded as if a process had been spawned for it, then
/// executed against a local registry. Failures and delays can be scripted
/// per chunk id or per task.
#[derive(Clone)]
pub struct MockChunkRunner {
    registry: Arc<TaskRegistry>,
    call_history: Arc<Mutex<Vec<ChunkRequest>>>,
    failures: Arc<Mutex<HashMap<FailureKey, String>>>,
    delays: Arc<Mutex<HashMap<u32, Duration>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FailureKey {
    Chunk(u32),
    Task(String),
}

impl MockChunkRunner {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            call_history: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            delays: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_builtins() -> Self {
        Self::new(TaskRegistry::with_builtins())
    }

    /// Requests for this chunk id reply with an explicit error
    pub fn fail_chunk(&self, chunk_id: u32, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(FailureKey::Chunk(chunk_id), message.to_string());
    }

    /// Requests running this task reply with an explicit error
    pub fn fail_task(&self, task_id: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(FailureKey::Task(task_id.to_string()), message.to_string());
    }

    /// Hold the reply for this chunk id, to force out-of-order completion
    pub fn delay_chunk(&self, chunk_id: u32, delay: Duration) {
        self.delays.lock().unwrap().insert(chunk_id, delay);
    }

    /// Number of simulated worker processes started so far
    pub fn spawn_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    pub fn verify_called(&self, task_id: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history
            .iter()
            .filter(|request| request.work_unit.task_id == task_id)
            .count();
        count == times
    }

    pub fn get_call_history(&self) -> Vec<ChunkRequest> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.call_history.lock().unwrap().clear();
        self.failures.lock().unwrap().clear();
        self.delays.lock().unwrap().clear();
    }

    fn scripted_failure(&self, request: &ChunkRequest) -> Option<String> {
        let failures = self.failures.lock().unwrap();
        failures
            .get(&FailureKey::Chunk(request.id))
            .or_else(|| failures.get(&FailureKey::Task(request.work_unit.task_id.clone())))
            .cloned()
    }
}

#[async_trait]
impl ChunkRunner for MockChunkRunner {
    async fn run(&self, request: ChunkRequest) -> Result<Value, WorkerProcessError> {
        self.call_history.lock().unwrap().push(request.clone());

        let delay = self.delays.lock().unwrap().get(&request.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.scripted_failure(&request) {
            return Err(WorkerProcessError::Task { message });
        }

        self.registry
            .execute(&request.work_unit, request.inputs)
            .map_err(|e| WorkerProcessError::Task {
                message: e.to_string(),
            })
    }
}

impl Default for MockChunkRunner {
    fn default() -> Self {
        Self::with_builtins()
    }
}
