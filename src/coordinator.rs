//! The map/reduce coordinator
//!
//! `map_reduce` validates its input, partitions a private copy of it, runs
//! one worker process per chunk concurrently, collects every chunk result in
//! worker-index order, and hands that sequence to one more worker running the
//! reduce task.

use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::channel::{ChunkRunner, ProcessChannelRunner};
use crate::config::{CoordinatorConfig, FailurePolicy};
use crate::core::mapreduce::{partition, spawned_process_count, validate_worker_count};
use crate::error::{ConfigError, MapReduceError, Result};
use crate::protocol::ChunkRequest;
use crate::task::WorkUnit;

/// Worker count used when the host cannot report its parallelism
const FALLBACK_PARALLELISM: usize = 4;

/// Request id carried by the single reduce request
const REDUCE_REQUEST_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Map,
    Reduce,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Map => f.write_str("map"),
            Phase::Reduce => f.write_str("reduce"),
        }
    }
}

/// Per-call options; unset fields fall back to the coordinator's defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapReduceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,
}

impl MapReduceOptions {
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count: Some(worker_count),
        }
    }
}

/// Number of execution units the host reports
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_PARALLELISM)
}

/// Orchestrates both phases over a [`ChunkRunner`].
///
/// Immutable once built and cheap to clone; see [`crate::coordinator()`] for
/// the process-wide instance.
#[derive(Clone)]
pub struct Coordinator {
    runner: Arc<dyn ChunkRunner>,
    default_worker_count: usize,
}

impl Coordinator {
    /// Coordinator whose default worker count is the host's parallelism
    pub fn new(runner: Arc<dyn ChunkRunner>) -> Self {
        Self {
            runner,
            default_worker_count: host_parallelism(),
        }
    }

    /// Coordinator that starts the bundled worker binary
    pub fn production() -> Self {
        Self::build(&CoordinatorConfig::default())
    }

    pub fn from_config(config: &CoordinatorConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &CoordinatorConfig) -> Self {
        let runner = ProcessChannelRunner::new(config.worker.clone())
            .kill_on_drop(config.failure_policy == FailurePolicy::TerminateSiblings);

        let coordinator = Self::new(Arc::new(runner));
        match config.default_worker_count {
            Some(count) => coordinator.with_default_worker_count(count),
            None => coordinator,
        }
    }

    pub fn with_default_worker_count(mut self, worker_count: usize) -> Self {
        self.default_worker_count = worker_count;
        self
    }

    pub fn default_worker_count(&self) -> usize {
        self.default_worker_count
    }

    /// Supplied options merged over the coordinator defaults
    pub fn effective_worker_count(&self, options: Option<MapReduceOptions>) -> usize {
        options
            .and_then(|o| o.worker_count)
            .unwrap_or(self.default_worker_count)
    }

    /// Run `map_unit` over `data` in parallel worker processes and reduce the
    /// ordered chunk results with `reduce_unit` in one more.
    ///
    /// Fails with [`MapReduceError::EmptyInput`] before spawning anything when
    /// `data` is empty. The first worker failure in either phase is returned
    /// unchanged and no partial result is produced.
    pub async fn map_reduce(
        &self,
        data: &[Value],
        map_unit: &WorkUnit,
        reduce_unit: &WorkUnit,
        options: Option<MapReduceOptions>,
    ) -> Result<Value> {
        if data.is_empty() {
            return Err(MapReduceError::EmptyInput);
        }

        let worker_count = self.effective_worker_count(options);
        validate_worker_count(worker_count)?;

        let span = tracing::info_span!(
            "map_reduce",
            items = data.len(),
            workers = worker_count,
            map = %map_unit,
            reduce = %reduce_unit
        );

        async {
            let start = Instant::now();
            debug!(
                "Starting map/reduce with {} worker processes",
                spawned_process_count(worker_count)
            );

            let partials = self.map_phase(data.to_vec(), map_unit, worker_count).await?;
            let result = self.reduce_phase(partials, reduce_unit).await?;

            info!("Map/reduce completed in {:?}", start.elapsed());
            Ok::<Value, MapReduceError>(result)
        }
        .instrument(span)
        .await
    }

    /// Typed front end over [`Coordinator::map_reduce`]
    pub async fn map_reduce_as<T, R>(
        &self,
        data: &[T],
        map_unit: &WorkUnit,
        reduce_unit: &WorkUnit,
        options: Option<MapReduceOptions>,
    ) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let values = data
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<Value>>>()?;
        let result = self
            .map_reduce(&values, map_unit, reduce_unit, options)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Partition `data` and run `unit` over every chunk concurrently.
    ///
    /// Results come back in worker-index order regardless of which worker
    /// finishes first. Returns on the first failure without waiting for the
    /// remaining workers.
    pub async fn map_phase(
        &self,
        data: Vec<Value>,
        unit: &WorkUnit,
        worker_count: usize,
    ) -> Result<Vec<Value>> {
        let start = Instant::now();
        let chunks = partition(data, worker_count)?;

        let dispatches = chunks.into_iter().zip(1..=u32::MAX).map(|(inputs, chunk_id)| {
            let request = ChunkRequest::new(chunk_id, unit.clone(), inputs);
            let runner = Arc::clone(&self.runner);

            async move {
                runner
                    .run(request)
                    .await
                    .map_err(|e| MapReduceError::worker(Phase::Map, chunk_id, e))
            }
        });

        match try_join_all(dispatches).await {
            Ok(partials) => {
                debug!(
                    "Map phase collected {} chunk results in {:?}",
                    partials.len(),
                    start.elapsed()
                );
                Ok(partials)
            }
            Err(e) => {
                warn!("Map phase failed: {}", e);
                Err(e)
            }
        }
    }

    /// Run `unit` once over the ordered chunk results.
    pub async fn reduce_phase(&self, partials: Vec<Value>, unit: &WorkUnit) -> Result<Value> {
        let start = Instant::now();
        let request = ChunkRequest::new(REDUCE_REQUEST_ID, unit.clone(), partials);

        match self.runner.run(request).await {
            Ok(value) => {
                debug!("Reduce phase finished in {:?}", start.elapsed());
                Ok(value)
            }
            Err(e) => {
                warn!("Reduce phase failed: {}", e);
                Err(MapReduceError::worker(Phase::Reduce, REDUCE_REQUEST_ID, e))
            }
        }
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("default_worker_count", &self.default_worker_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MockChunkRunner, WorkerProcessError};
    use crate::error::PartitionError;
    use crate::task::{TaskError, TaskRegistry};
    use serde_json::json;
    use std::time::Duration;

    fn sample_data() -> Vec<Value> {
        [4, 2, 6, 8, 5, 3, 2, 5, 3, 9, 5, 6, 7, 4, 3, 2]
            .into_iter()
            .map(|n| json!(n))
            .collect()
    }

    fn mock_coordinator() -> (Coordinator, MockChunkRunner) {
        let mock = MockChunkRunner::with_builtins();
        let coordinator = Coordinator::new(Arc::new(mock.clone()));
        (coordinator, mock)
    }

    fn sum() -> WorkUnit {
        WorkUnit::new("sum")
    }

    #[tokio::test]
    async fn test_sum_with_four_workers() {
        let (coordinator, mock) = mock_coordinator();

        let result = coordinator
            .map_reduce(&sample_data(), &sum(), &sum(), Some(MapReduceOptions::with_workers(4)))
            .await
            .unwrap();

        assert_eq!(result, json!(74));
        assert_eq!(mock.spawn_count(), 5);
        assert!(mock.verify_called("sum", 5));
    }

    #[tokio::test]
    async fn test_sum_is_independent_of_worker_count() {
        for workers in 1..=20 {
            let (coordinator, mock) = mock_coordinator();
            let result = coordinator
                .map_reduce(
                    &sample_data(),
                    &sum(),
                    &sum(),
                    Some(MapReduceOptions::with_workers(workers)),
                )
                .await
                .unwrap();

            assert_eq!(result, json!(74), "workers = {}", workers);
            assert_eq!(mock.spawn_count(), workers + 1);
        }
    }

    #[tokio::test]
    async fn test_empty_data_rejected_before_spawning() {
        let (coordinator, mock) = mock_coordinator();

        let err = coordinator
            .map_reduce(&[], &sum(), &sum(), None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Data is empty");
        assert!(matches!(err, MapReduceError::EmptyInput));
        assert_eq!(mock.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_workers_rejected_before_spawning() {
        let (coordinator, mock) = mock_coordinator();

        let err = coordinator
            .map_reduce(&sample_data(), &sum(), &sum(), Some(MapReduceOptions::with_workers(0)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MapReduceError::Partition(PartitionError::InvalidWorkerCount(0))
        ));
        assert_eq!(mock.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_worker_count_beyond_chunk_ids_rejected_before_spawning() {
        let (coordinator, mock) = mock_coordinator();

        let past_u32 = usize::try_from(u64::from(u32::MAX) + 1).unwrap_or(usize::MAX);
        for workers in [usize::MAX, past_u32] {
            let err = coordinator
                .map_reduce(&[json!(1)], &sum(), &sum(), Some(MapReduceOptions::with_workers(workers)))
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                MapReduceError::Partition(PartitionError::InvalidWorkerCount(n)) if n == workers
            ));
        }
        assert_eq!(mock.spawn_count(), 0);
    }

    #[tokio::test]
    async fn test_default_worker_count_is_host_parallelism() {
        let (coordinator, mock) = mock_coordinator();
        assert_eq!(coordinator.default_worker_count(), host_parallelism());

        let result = coordinator
            .map_reduce(&sample_data(), &sum(), &sum(), None)
            .await
            .unwrap();

        assert_eq!(result, json!(74));
        assert_eq!(mock.spawn_count(), host_parallelism() + 1);
    }

    #[tokio::test]
    async fn test_options_override_default_worker_count() {
        let (coordinator, mock) = mock_coordinator();
        let coordinator = coordinator.with_default_worker_count(9);

        coordinator
            .map_reduce(&sample_data(), &sum(), &sum(), None)
            .await
            .unwrap();
        assert_eq!(mock.spawn_count(), 10);

        mock.reset();
        coordinator
            .map_reduce(&sample_data(), &sum(), &sum(), Some(MapReduceOptions::with_workers(12)))
            .await
            .unwrap();
        assert_eq!(mock.spawn_count(), 13);

        mock.reset();
        coordinator
            .map_reduce(&sample_data(), &sum(), &sum(), Some(MapReduceOptions::default()))
            .await
            .unwrap();
        assert_eq!(mock.spawn_count(), 10);
    }

    #[tokio::test]
    async fn test_more_workers_than_items_sends_empty_chunks() {
        let (coordinator, mock) = mock_coordinator();
        let data = vec![json!(1), json!(2), json!(3)];

        let result = coordinator
            .map_reduce(&data, &sum(), &sum(), Some(MapReduceOptions::with_workers(5)))
            .await
            .unwrap();
        assert_eq!(result, json!(6));

        let history = mock.get_call_history();
        assert_eq!(history.len(), 6);
        let map_requests = &history[..5];
        let mut ids: Vec<u32> = map_requests.iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        for request in map_requests {
            if request.id < 5 {
                assert!(request.inputs.is_empty());
            } else {
                assert_eq!(request.inputs, data);
            }
        }

        let reduce_request = &history[5];
        assert_eq!(
            reduce_request.inputs,
            vec![json!(0), json!(0), json!(0), json!(0), json!(6)]
        );
    }

    #[tokio::test]
    async fn test_reduce_input_follows_worker_order_not_completion_order() {
        let (coordinator, mock) = mock_coordinator();
        mock.delay_chunk(1, Duration::from_millis(80));
        mock.delay_chunk(2, Duration::from_millis(40));

        let data = sample_data();
        let result = coordinator
            .map_reduce(
                &data,
                &WorkUnit::new("identity"),
                &WorkUnit::new("concat"),
                Some(MapReduceOptions::with_workers(4)),
            )
            .await
            .unwrap();

        assert_eq!(result, Value::Array(data));
    }

    #[tokio::test]
    async fn test_map_failure_fails_call_and_skips_reduce() {
        let (coordinator, mock) = mock_coordinator();
        mock.fail_chunk(2, "chunk 2 exploded");

        let err = coordinator
            .map_reduce(
                &sample_data(),
                &sum(),
                &WorkUnit::new("identity"),
                Some(MapReduceOptions::with_workers(4)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Map));
        match err.worker_error() {
            Some(WorkerProcessError::Task { message }) => assert_eq!(message, "chunk 2 exploded"),
            other => panic!("Expected task error, got {:?}", other),
        }
        assert!(mock.verify_called("identity", 0));
    }

    #[tokio::test]
    async fn test_reduce_failure_fails_call() {
        let (coordinator, mock) = mock_coordinator();
        mock.fail_task("mean_of_partials", "reducer exploded");

        let err = coordinator
            .map_reduce(
                &sample_data(),
                &WorkUnit::new("sum_count"),
                &WorkUnit::new("mean_of_partials"),
                Some(MapReduceOptions::with_workers(2)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Reduce));
        assert!(err.to_string().contains("reducer exploded"));
        assert_eq!(mock.spawn_count(), 3);
    }

    #[tokio::test]
    async fn test_map_reduce_as_computes_mean() {
        let (coordinator, _mock) = mock_coordinator();
        let data: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];

        let mean: f64 = coordinator
            .map_reduce_as(
                &data,
                &WorkUnit::new("sum_count"),
                &WorkUnit::new("mean_of_partials"),
                Some(MapReduceOptions::with_workers(3)),
            )
            .await
            .unwrap();

        assert!((mean - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_custom_registry_task() {
        let mut registry = TaskRegistry::new();
        registry
            .register("square_all", |inputs| {
                inputs
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        v.as_i64()
                            .map(|n| json!(n * n))
                            .ok_or_else(|| TaskError::invalid_input(i, "expected an integer"))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Value::Array)
            })
            .register("concat", |inputs| {
                Ok(Value::Array(
                    inputs
                        .into_iter()
                        .flat_map(|v| v.as_array().cloned().unwrap_or_default())
                        .collect(),
                ))
            });
        let coordinator = Coordinator::new(Arc::new(MockChunkRunner::new(registry)));

        let squares: Vec<i64> = coordinator
            .map_reduce_as(
                &[1, 2, 3, 4, 5],
                &WorkUnit::new("square_all"),
                &WorkUnit::new("concat"),
                Some(MapReduceOptions::with_workers(2)),
            )
            .await
            .unwrap();

        assert_eq!(squares, vec![1, 4, 9, 16, 25]);
    }

    #[tokio::test]
    async fn test_caller_data_is_untouched() {
        let (coordinator, _mock) = mock_coordinator();
        let data = sample_data();
        let before = data.clone();

        coordinator
            .map_reduce(&data, &sum(), &sum(), Some(MapReduceOptions::with_workers(3)))
            .await
            .unwrap();

        assert_eq!(data, before);
    }

    #[tokio::test]
    async fn test_phases_can_run_separately() {
        let (coordinator, mock) = mock_coordinator();

        let partials = coordinator
            .map_phase(sample_data(), &sum(), 4)
            .await
            .unwrap();
        assert_eq!(partials, vec![json!(20), json!(15), json!(23), json!(16)]);

        let total = coordinator.reduce_phase(partials, &sum()).await.unwrap();
        assert_eq!(total, json!(74));
        assert_eq!(mock.spawn_count(), 5);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Map.to_string(), "map");
        assert_eq!(Phase::Reduce.to_string(), "reduce");
    }

    #[test]
    fn test_options_serde_defaults() {
        let options: MapReduceOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, MapReduceOptions::default());
        assert_eq!(
            serde_json::to_value(MapReduceOptions::with_workers(3)).unwrap(),
            json!({"worker_count": 3})
        );
    }
}
