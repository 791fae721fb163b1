use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::protocol::WORKER_FLAG;

/// Name of the worker binary shipped with this crate
pub const BUNDLED_WORKER: &str = "mapreduce-worker";

/// How to start one worker process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    /// The bundled `mapreduce-worker` binary.
    ///
    /// Looks next to the running executable first (and one directory up, which
    /// covers test binaries under `target/*/deps`), then falls back to `PATH`.
    pub fn bundled() -> Self {
        let found = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .and_then(|dir| {
                let candidates = [dir.join(BUNDLED_WORKER), dir.join("..").join(BUNDLED_WORKER)];
                candidates.into_iter().find(|path| path.is_file())
            });

        match found {
            Some(path) => Self::new(path.to_string_lossy().into_owned()),
            None => Self::new(BUNDLED_WORKER),
        }
    }

    /// Re-execute the current binary in worker mode.
    ///
    /// The host's `main` must check [`crate::worker::is_worker_invocation`]
    /// and hand control to the worker loop before doing anything else.
    pub fn current_exe() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(exe.to_string_lossy().into_owned()).with_arg(WORKER_FLAG))
    }

    pub fn with_arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Human-readable command line for logs and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self::bundled()
    }
}

pub struct WorkerCommandBuilder {
    command: WorkerCommand,
}

impl WorkerCommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            command: WorkerCommand::new(program),
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            self.command
                .env
                .insert(key.as_ref().to_string(), value.as_ref().to_string());
        }
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn build(self) -> WorkerCommand {
        self.command
    }
}
