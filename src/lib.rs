//! # Prometheus Concurrency
//!
//! Thread-based building blocks for producer/consumer systems, built on
//! `parking_lot` mutexes and condition variables.
//!
//! ## Primitives
//!
//! - **[`BoundedQueue`](core::BoundedQueue)**: FIFO channel with a fixed capacity.
//!   Producers block while it is full, consumers block while it is empty, and
//!   closing wakes everyone.
//! - **[`WorkerPool`](core::WorkerPool)**: fixed set of worker threads.
//!   `submit` returns a [`TaskFuture`](core::TaskFuture) that can be waited on,
//!   polled or cancelled before the task starts. A failing or panicking task
//!   never takes down its worker.
//! - **[`PhaseBarrier`](core::PhaseBarrier)**: reusable rendezvous for N threads,
//!   driven by a phase counter.
//! - **[`ReadersWriterLock`](core::ReadersWriterLock)**: shared/exclusive lock
//!   with writer preference. Once a writer is waiting, new readers queue
//!   behind it.
//! - **[`StagePipeline`](core::StagePipeline)**: chain of stages, one thread
//!   each, connected by bounded queues.
//!
//! ## Worker pool
//!
//! ```rust
//! use prometheus_concurrency::config::WorkerPoolConfig;
//! use prometheus_concurrency::core::WorkerPool;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4))?;
//!
//! let futures: Vec<_> = (0..10_u64)
//!     .map(|i| pool.submit(move || i * i))
//!     .collect::<Result<_, _>>()?;
//!
//! let mut squares: Vec<u64> = futures
//!     .into_iter()
//!     .map(|f| f.wait())
//!     .collect::<Result<_, _>>()?;
//! squares.sort_unstable();
//! assert_eq!(squares, (0..10).map(|i| i * i).collect::<Vec<_>>());
//!
//! pool.shutdown(true);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration
//!
//! Every primitive can be described by a serde config (see [`config`]) and
//! constructed through [`builders`]:
//!
//! ```rust
//! use prometheus_concurrency::builders::build_queue;
//! use prometheus_concurrency::config::PrimitivesConfig;
//!
//! let cfg = PrimitivesConfig::from_json_str(r#"{ "queue": { "capacity": 8 } }"#)?;
//! let queue = build_queue::<String>(&cfg.queue.unwrap())?;
//! assert_eq!(queue.capacity(), 8);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Logging
//!
//! Components log through the [`LogSink`](core::LogSink) they are given;
//! the default forwards to `tracing`. Call [`util::init_tracing`] to install a
//! `RUST_LOG`-driven subscriber.
//!
//! ## Feature flags
//!
//! - `tokio-runtime` (default): `TaskFuture::wait_async` for awaiting task
//!   results from async code.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Synchronization primitives, errors and logging sinks.
pub mod core;
/// Configuration models for queues, pools, barriers and pipelines.
pub mod config;
/// Builders to construct primitives from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    BoundedQueue, ErrorPolicy, FutureStatus, PhaseBarrier, ReadersWriterLock, StagePipeline,
    TaskFuture, WorkerPool,
};
