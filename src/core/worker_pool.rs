//! Fixed-size worker thread pool with future-based results.
//!
//! The pool spawns `worker_count` dedicated OS threads that all block on one
//! shared, unbounded [`BoundedQueue`]. Each submission returns a
//! [`TaskFuture`] immediately; submission itself never blocks.
//!
//! # Design Principles
//!
//! - **No polling**: workers sleep on the queue's condvar, futures on their own
//! - **Failure isolation**: errors and panics are captured into the task's future;
//!   a worker thread never dies because of a task
//! - **Clean shutdown**: closing the queue lets workers drain what is queued and
//!   exit; every worker is joined, either by `shutdown(true)` or on drop
//!
//! # Example
//!
//! ```
//! use prometheus_concurrency::config::WorkerPoolConfig;
//! use prometheus_concurrency::core::WorkerPool;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4)).unwrap();
//! let futures: Vec<_> = (0..8_u64)
//!     .map(|i| pool.submit(move || i * i).unwrap())
//!     .collect();
//!
//! let squares: Vec<u64> = futures.into_iter().map(|f| f.wait().unwrap()).collect();
//! assert_eq!(squares, vec![0, 1, 4, 9, 16, 25, 36, 49]);
//! pool.shutdown(true);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::WorkerPoolConfig;

use super::bounded_queue::BoundedQueue;
use super::error::{PoolError, TaskError};
use super::log_sink::{LogLevel, LogSink, TracingSink};
use super::task::{panic_message, promise, TaskFuture};

/// Lifecycle of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting and executing tasks.
    Running,
    /// No longer accepting tasks; queued tasks are still being executed.
    Draining,
    /// Every worker has exited.
    Terminated,
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Currently executing tasks.
    pub active_tasks: u64,
    /// Tasks waiting in the queue.
    pub queued_tasks: u64,
    /// Total tasks accepted by `submit`.
    pub submitted_tasks: u64,
    /// Tasks that produced a value.
    pub completed_tasks: u64,
    /// Tasks that returned an error or panicked.
    pub failed_tasks: u64,
    /// Tasks skipped because their future was cancelled.
    pub cancelled_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    active_tasks: AtomicU64,
    queued_tasks: AtomicU64,
    submitted_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
    cancelled_tasks: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
        }
    }
}

enum JobOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// A type-erased task: runs the user closure and fulfils its promise.
struct Job {
    id: u64,
    run: Box<dyn FnOnce() -> JobOutcome + Send>,
}

/// Worker pool with dedicated OS threads.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queue: BoundedQueue<Job>,
    counters: Arc<PoolCounters>,
    live_workers: Arc<AtomicUsize>,
    shutdown: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    task_id_counter: AtomicU64,
    sink: Arc<dyn LogSink>,
}

impl WorkerPool {
    /// Create a pool logging through [`TracingSink`].
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid and
    /// `PoolError::Internal` if a worker thread cannot be spawned.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a pool that reports diagnostics to `sink`.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerPool::new`].
    pub fn with_sink(config: WorkerPoolConfig, sink: Arc<dyn LogSink>) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let queue = BoundedQueue::unbounded();
        let counters = Arc::new(PoolCounters::default());
        let live_workers = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            match spawn_worker(
                worker_id,
                &config,
                queue.clone(),
                Arc::clone(&counters),
                Arc::clone(&live_workers),
                Arc::clone(&sink),
            ) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    queue.close();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    sink.record(
                        LogLevel::Error,
                        &format!("failed to spawn worker {worker_id}: {e}"),
                    );
                    return Err(PoolError::Internal(format!(
                        "failed to spawn worker thread: {e}"
                    )));
                }
            }
        }

        sink.record(
            LogLevel::Info,
            &format!(
                "worker pool started with {} threads",
                config.worker_count
            ),
        );

        Ok(Self {
            config,
            queue,
            counters,
            live_workers,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
            task_id_counter: AtomicU64::new(0),
            sink,
        })
    }

    /// Submit a task producing a value. Never blocks.
    ///
    /// A panic inside `task` is captured as [`TaskError::Panicked`].
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolShutdown` once shutdown has begun.
    pub fn submit<F, R>(&self, task: F) -> Result<TaskFuture<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_fallible(move || Ok::<R, std::convert::Infallible>(task()))
    }

    /// Submit a task that may fail. An `Err` becomes [`TaskError::Failed`].
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolShutdown` once shutdown has begun.
    pub fn submit_fallible<F, R, E>(&self, task: F) -> Result<TaskFuture<R>, PoolError>
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let id = self.task_id_counter.fetch_add(1, Ordering::Relaxed);
        let (promise, future) = promise::<R>(id);

        let run: Box<dyn FnOnce() -> JobOutcome + Send> = Box::new(move || {
            if !promise.start() {
                return JobOutcome::Cancelled;
            }
            match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(value)) => {
                    promise.complete(Ok(value));
                    JobOutcome::Completed
                }
                Ok(Err(e)) => {
                    let err: anyhow::Error = e.into();
                    let message = format!("{err:#}");
                    promise.complete(Err(TaskError::Failed(err)));
                    JobOutcome::Failed(message)
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    promise.complete(Err(TaskError::Panicked(message.clone())));
                    JobOutcome::Failed(format!("panicked: {message}"))
                }
            }
        });

        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        if self.queue.push(Job { id, run }).is_err() {
            // Lost the race with shutdown; the job is dropped and its future abandoned.
            self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            return Err(PoolError::PoolShutdown);
        }
        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = id, "task submitted to worker pool");
        Ok(future)
    }

    /// Stop accepting tasks.
    ///
    /// Already queued tasks still run. With `wait = true` the call blocks until
    /// the queue is drained and every worker has been joined; otherwise it
    /// returns immediately. Safe to call any number of times.
    ///
    /// Called with `wait = true` from one of this pool's own workers, the
    /// calling worker cannot join itself: its handle is detached, and it
    /// finishes the current task and exits un-joined. Every other worker is
    /// still joined.
    pub fn shutdown(&self, wait: bool) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.sink.record(LogLevel::Info, "worker pool shutting down");
            self.queue.close();
        }
        if wait {
            self.join_workers();
        }
    }

    fn join_workers(&self) {
        // Holding the lock while joining makes concurrent waiters block until
        // every worker is gone.
        let mut workers = self.workers.lock();
        if workers.is_empty() {
            return;
        }
        let current = thread::current().id();
        let mut own = None;
        let mut joined = 0_usize;
        for handle in workers.drain(..) {
            if handle.thread().id() == current {
                own = Some(handle);
                continue;
            }
            if handle.join().is_err() {
                self.sink.record(LogLevel::Warning, "worker thread panicked");
            }
            joined += 1;
        }
        if let Some(handle) = own {
            self.sink.record(
                LogLevel::Warning,
                "shutdown(wait) called from a worker thread; that worker exits on its own",
            );
            workers.push(handle);
        }
        self.sink.record(
            LogLevel::Info,
            &format!("worker pool shut down, {joined} workers joined"),
        );
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        if !self.shutdown.load(Ordering::Acquire) {
            PoolState::Running
        } else if self.live_workers.load(Ordering::Acquire) == 0 {
            PoolState::Terminated
        } else {
            PoolState::Draining
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }
}

/// Dropping the pool is `shutdown(true)`.
///
/// If the last handle is dropped on one of the pool's own workers, that
/// worker is not joined. It runs the rest of its current task and exits on
/// its own; the remaining workers are joined before `drop` returns.
impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.config.worker_count)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn spawn_worker(
    worker_id: usize,
    config: &WorkerPoolConfig,
    queue: BoundedQueue<Job>,
    counters: Arc<PoolCounters>,
    live_workers: Arc<AtomicUsize>,
    sink: Arc<dyn LogSink>,
) -> std::io::Result<JoinHandle<()>> {
    let mut builder =
        thread::Builder::new().name(format!("{}-{worker_id}", config.thread_name_prefix));
    if let Some(stack_size) = config.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    live_workers.fetch_add(1, Ordering::AcqRel);
    let spawned = builder.spawn({
        let live_workers = Arc::clone(&live_workers);
        move || {
            debug!(worker_id, "worker thread started");

            // Blocks on the queue condvar; returns None once closed and drained.
            while let Some(job) = queue.pop() {
                counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                counters.active_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id, task_id = job.id, "worker executing task");

                let outcome = (job.run)();

                counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
                match outcome {
                    JobOutcome::Completed => {
                        counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                    }
                    JobOutcome::Failed(message) => {
                        counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                        sink.record(
                            LogLevel::Error,
                            &format!("task {} failed: {message}", job.id),
                        );
                    }
                    JobOutcome::Cancelled => {
                        counters.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
                        debug!(worker_id, task_id = job.id, "skipping cancelled task");
                    }
                }
            }

            debug!(worker_id, "worker thread exiting");
            live_workers.fetch_sub(1, Ordering::AcqRel);
        }
    });
    if spawned.is_err() {
        live_workers.fetch_sub(1, Ordering::AcqRel);
    }
    spawned
}
