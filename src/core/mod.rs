//! Synchronization primitives and their shared error and logging types.

pub mod barrier;
pub mod bounded_queue;
pub mod error;
pub mod log_sink;
pub mod pipeline;
pub mod rw_lock;
pub mod task;
pub mod worker_pool;

pub use barrier::{BarrierWaitResult, PhaseBarrier};
pub use bounded_queue::BoundedQueue;
pub use error::{
    ConfigError, PipelineError, PoolError, QueueError, StageError, TaskError, TryPushError,
};
pub use log_sink::{InMemoryLogSink, LogLevel, LogRecord, LogSink, NullSink, TracingSink};
pub use pipeline::{stages, ErrorPolicy, PipelineBuilder, StagePipeline, Transform};
pub use rw_lock::{ReadGuard, ReadersWriterLock, RwResource, WriteGuard};
pub use task::{FutureStatus, TaskFuture};
pub use worker_pool::{PoolState, PoolStats, WorkerPool};
