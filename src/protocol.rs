//! Coordinator/worker message contract
//!
//! One request line goes down the worker's stdin, one reply line comes back
//! on its stdout. Both are single-line JSON documents terminated by `\n`.

use crate::task::WorkUnit;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker argument that puts a self-re-executing host binary into worker mode
pub const WORKER_FLAG: &str = "--mapreduce-worker";

/// The single message a worker receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRequest {
    /// 1-based position within the batch; used for identification and logging only
    pub id: u32,
    pub work_unit: WorkUnit,
    pub inputs: Vec<Value>,
}

impl ChunkRequest {
    pub fn new(id: u32, work_unit: WorkUnit, inputs: Vec<Value>) -> Self {
        Self {
            id,
            work_unit,
            inputs,
        }
    }
}

/// The single message a worker sends back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    Ok { value: Value },
    Error { message: String },
}

impl WorkerReply {
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Error { message } => Err(message),
        }
    }
}

/// Serialize a message as one newline-terminated line
pub fn encode_line<T: Serialize>(message: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line, ignoring the trailing newline
pub fn decode_line<T: for<'de> Deserialize<'de>>(line: &str) -> serde_json::Result<T> {
    serde_json::from_str(line.trim_end_matches(&['\n', '\r'][..]))
}
