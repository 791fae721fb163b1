//! Task registry
//!
//! Work units cross the process boundary as a name, never as code. Each
//! worker process owns its own `TaskRegistry` and resolves the name against
//! it before running the task over its chunk.

pub mod builtins;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A reference to a task registered in the worker's registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    pub task_id: String,
}

impl WorkUnit {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.task_id)
    }
}

impl From<&str> for WorkUnit {
    fn from(task_id: &str) -> Self {
        Self::new(task_id)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid input at index {index}: {message}")]
    InvalidInput { index: usize, message: String },

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn invalid_input(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            index,
            message: message.into(),
        }
    }
}

/// A statically compiled task: an ordered sequence of inputs in, one value out.
pub type TaskFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, TaskError> + Send + Sync>;

/// Registry holding the mapping between task names and their implementation.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskFn>,
}

impl TaskRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in tasks.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_builtins(&mut registry);
        registry
    }

    /// Registers a task under `task_id`, replacing any previous task with that name.
    pub fn register<F>(&mut self, task_id: &str, task: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        if self.tasks.insert(task_id.to_string(), Arc::new(task)).is_some() {
            tracing::debug!("Replaced task: {}", task_id);
        } else {
            tracing::trace!("Registered task: {}", task_id);
        }
        self
    }

    pub fn get(&self, task_id: &str) -> Option<TaskFn> {
        self.tasks.get(task_id).cloned()
    }

    /// Looks up the work unit and runs it over `inputs`.
    pub fn execute(&self, unit: &WorkUnit, inputs: Vec<Value>) -> Result<Value, TaskError> {
        let task = self
            .get(&unit.task_id)
            .ok_or_else(|| TaskError::UnknownTask(unit.task_id.clone()))?;

        tracing::debug!(
            "Executing task '{}' over {} inputs",
            unit.task_id,
            inputs.len()
        );
        task(inputs)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Registered task names, sorted
    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.task_ids())
            .finish()
    }
}
