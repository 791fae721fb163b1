//! `mapreduce-worker`: serves one chunk request with the built-in tasks, then exits.

use parallel_mapreduce::logging::init_tracing;
use parallel_mapreduce::task::TaskRegistry;
use parallel_mapreduce::worker::serve_stdio;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing(0);

    let registry = TaskRegistry::with_builtins();
    serve_stdio(&registry).await
}
