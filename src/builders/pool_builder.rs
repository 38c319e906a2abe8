//! Builders to construct pools, queues, barriers and pipelines from configuration.

use std::sync::Arc;

use crate::config::{BarrierConfig, PipelineConfig, QueueConfig, StageConfig, WorkerPoolConfig};
use crate::core::{
    BoundedQueue, ConfigError, LogSink, PhaseBarrier, PipelineError, PoolError, StagePipeline,
    Transform, WorkerPool,
};

/// Start a worker pool reporting to `sink`.
///
/// # Errors
///
/// `PoolError::InvalidConfig` when the config does not validate.
pub fn build_worker_pool(cfg: &WorkerPoolConfig, sink: Arc<dyn LogSink>) -> Result<WorkerPool, PoolError> {
    WorkerPool::with_sink(cfg.clone(), sink)
}

/// Create an empty queue with the configured capacity.
///
/// # Errors
///
/// `ConfigError::Invalid` for a zero capacity.
pub fn build_queue<T>(cfg: &QueueConfig) -> Result<BoundedQueue<T>, ConfigError> {
    cfg.validate()
        .map_err(|e| ConfigError::Invalid(format!("queue invalid: {e}")))?;
    Ok(BoundedQueue::new(cfg.capacity))
}

/// Create a barrier for the configured number of participants.
///
/// # Errors
///
/// `ConfigError::Invalid` for zero participants.
pub fn build_barrier(cfg: &BarrierConfig) -> Result<PhaseBarrier, ConfigError> {
    cfg.validate()
        .map_err(|e| ConfigError::Invalid(format!("barrier invalid: {e}")))?;
    Ok(PhaseBarrier::new(cfg.participants))
}

/// Start a pipeline whose stages come from `cfg`. `transform_factory` is
/// called once per stage, in order, and returns the transform registered for
/// that stage's name.
///
/// # Errors
///
/// `PipelineError::UnknownTransform` when the factory has nothing for a stage,
/// plus anything [`PipelineBuilder::build`](crate::core::PipelineBuilder::build)
/// reports.
pub fn build_pipeline<T, F>(
    cfg: &PipelineConfig,
    sink: Arc<dyn LogSink>,
    mut transform_factory: F,
) -> Result<StagePipeline<T>, PipelineError>
where
    T: Send + 'static,
    F: FnMut(&StageConfig) -> Option<Transform<T>>,
{
    let mut builder = StagePipeline::builder()
        .error_policy(cfg.error_policy)
        .sink(sink);
    for stage in &cfg.stages {
        let transform = transform_factory(stage)
            .ok_or_else(|| PipelineError::UnknownTransform(stage.name.clone()))?;
        builder = builder.boxed_stage(stage.name.clone(), stage.capacity, transform);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorPolicy, InMemoryLogSink, LogLevel, NullSink};

    fn boxed(f: impl Fn(i64) -> i64 + Send + 'static) -> Transform<i64> {
        Box::new(move |x: i64| Ok::<_, anyhow::Error>(Some(f(x))))
    }

    fn stage(name: &str, capacity: usize) -> StageConfig {
        StageConfig {
            name: name.into(),
            capacity,
        }
    }

    #[test]
    fn test_build_queue_and_barrier() {
        let queue: BoundedQueue<u8> = build_queue(&QueueConfig { capacity: 3 }).unwrap();
        assert_eq!(queue.capacity(), 3);
        assert!(build_queue::<u8>(&QueueConfig { capacity: 0 }).is_err());

        let barrier = build_barrier(&BarrierConfig { participants: 2 }).unwrap();
        assert_eq!(barrier.participants(), 2);
        assert!(matches!(
            build_barrier(&BarrierConfig { participants: 0 }),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_build_worker_pool_logs_to_sink() {
        let sink = Arc::new(InMemoryLogSink::new(16));
        let cfg = WorkerPoolConfig::new().with_worker_count(2);
        let pool = build_worker_pool(&cfg, sink.clone()).unwrap();
        assert_eq!(pool.worker_count(), 2);
        pool.shutdown(true);
        assert!(sink.count(LogLevel::Info) >= 1);
    }

    #[test]
    fn test_build_pipeline_by_name() {
        let cfg = PipelineConfig {
            stages: vec![stage("double", 2), stage("add_ten", 2)],
            error_policy: ErrorPolicy::Drop,
        };
        let pipeline = build_pipeline(&cfg, Arc::new(NullSink), |stage| match stage.name.as_str() {
            "double" => Some(boxed(|x| x * 2)),
            "add_ten" => Some(boxed(|x| x + 10)),
            _ => None,
        })
        .unwrap();
        assert_eq!(pipeline.stage_names(), ["double", "add_ten"]);
        pipeline.submit_item(5).unwrap();
        pipeline.shutdown();
        assert_eq!(pipeline.next_output(), Some(Ok(20)));
    }

    #[test]
    fn test_build_pipeline_unknown_stage() {
        let cfg = PipelineConfig {
            stages: vec![stage("mystery", 1)],
            error_policy: ErrorPolicy::Forward,
        };
        let result = build_pipeline::<i64, _>(&cfg, Arc::new(NullSink), |_| None);
        assert!(matches!(result, Err(PipelineError::UnknownTransform(name)) if name == "mystery"));
    }
}
