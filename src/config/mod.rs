//! Configuration models for queues, pools, barriers and pipelines.

pub mod pool;
pub mod primitives;

pub use pool::{WorkerPoolConfig, ENV_WORKER_COUNT, ENV_WORKER_STACK_SIZE};
pub use primitives::{BarrierConfig, PipelineConfig, PrimitivesConfig, QueueConfig, StageConfig};
