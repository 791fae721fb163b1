//! Logging configuration and initialization
//!
//! The library only emits `tracing` events; binaries decide where they go.
//! Worker processes must log to stderr because stdout carries the reply.

use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install a stderr subscriber. `RUST_LOG` wins over `verbose` when set.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(verbose: u8) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .with_line_number(verbose >= 3)
        .try_init()
        .is_ok();

    if installed {
        debug!("Logging initialized with verbosity level: {}", verbose);
        trace!("Full args: {:?}", std::env::args().collect::<Vec<_>>());
    }
    installed
}
