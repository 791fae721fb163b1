//! Process channels: spawn a worker, hand it one chunk, await its one reply.

pub mod command;
pub mod error;
pub mod mock;
pub mod runner;


pub use command::{WorkerCommand, WorkerCommandBuilder, BUNDLED_WORKER};
pub use error::WorkerProcessError;
pub use mock::MockChunkRunner;
pub use runner::{ChunkRunner, ProcessChannel, ProcessChannelRunner};
