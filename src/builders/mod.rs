//! Builders to construct primitives from configuration.

pub mod pool_builder;

pub use pool_builder::{build_barrier, build_pipeline, build_queue, build_worker_pool};
