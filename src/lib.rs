//! # parallel-mapreduce
//!
//! Runs a map step over an in-memory collection in several isolated worker
//! processes, then reduces the partial results in one more process.
//!
//! ```no_run
//! use parallel_mapreduce::{coordinator, MapReduceOptions, WorkUnit};
//! use serde_json::json;
//!
//! # async fn run() -> parallel_mapreduce::Result<()> {
//! let data: Vec<_> = (1..=100).map(|n| json!(n)).collect();
//! let sum = WorkUnit::new("sum");
//! let total = coordinator()
//!     .map_reduce(&data, &sum, &sum, Some(MapReduceOptions::with_workers(4)))
//!     .await?;
//! assert_eq!(total, json!(5050));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `coordinator` - Validation, fan-out of the map phase, fan-in, and the reduce phase
//! - `core` - Pure partitioning arithmetic
//! - `channel` - One-shot process channels to worker processes, plus an in-process mock
//! - `protocol` - The JSON-lines request/reply contract between coordinator and worker
//! - `worker` - The worker executor loop run inside each worker process
//! - `task` - Registry of named tasks a worker can run
//! - `config` - Coordinator configuration and builder
//! - `error` - Error taxonomy and error codes
//! - `logging` - `tracing` subscriber setup for binaries
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod task;
pub mod worker;

pub use channel::{ChunkRunner, MockChunkRunner, ProcessChannel, WorkerCommand, WorkerProcessError};
pub use config::{CoordinatorBuilder, CoordinatorConfig, FailurePolicy};
pub use coordinator::{host_parallelism, Coordinator, MapReduceOptions, Phase};
pub use error::{MapReduceError, PartitionError, Result};
pub use protocol::ChunkRequest;
pub use task::{TaskError, TaskRegistry, WorkUnit};

use once_cell::sync::OnceCell;

static COORDINATOR: OnceCell<Coordinator> = OnceCell::new();

/// The process-wide coordinator, built on first use.
///
/// Unless [`install_coordinator`] ran first, it starts the bundled
/// `mapreduce-worker` binary and defaults to the host's parallelism.
pub fn coordinator() -> &'static Coordinator {
    COORDINATOR.get_or_init(Coordinator::production)
}

/// Set the process-wide coordinator before its first use.
///
/// Hands the coordinator back if one is already in place.
pub fn install_coordinator(coordinator: Coordinator) -> std::result::Result<(), Coordinator> {
    COORDINATOR.set(coordinator)
}
