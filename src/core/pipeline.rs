//! Multi-stage processing pipeline.
//!
//! Every stage runs on its own thread, reads from its input
//! [`BoundedQueue`], applies a transform and pushes the result to the next
//! stage's input. While stage *k* works on one item, stage *k + 1* can already be
//! working on the previous one.
//!
//! Shutting down closes the first queue. Each stage drains its input, closes
//! its output, and exits, so end-of-stream travels down the chain. The final
//! output queue is unbounded, so shutdown never waits on an unread result.
//!
//! # Example
//!
//! ```
//! use prometheus_concurrency::core::StagePipeline;
//!
//! let pipeline = StagePipeline::builder()
//!     .map("double", 4, |x: i64| x * 2)
//!     .map("add_ten", 4, |x| x + 10)
//!     .build()
//!     .unwrap();
//!
//! for x in [1, 2, 3] {
//!     pipeline.submit_item(x).unwrap();
//! }
//! pipeline.shutdown();
//!
//! let out: Vec<i64> = pipeline.collect_outputs().into_iter().map(Result::unwrap).collect();
//! assert_eq!(out, vec![12, 14, 16]);
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bounded_queue::BoundedQueue;
use super::error::{PipelineError, StageError};
use super::log_sink::{LogLevel, LogSink, TracingSink};
use super::task::panic_message;

/// A stage transform: `Ok(Some(v))` forwards `v`, `Ok(None)` filters the item
/// out, `Err` is a per-item failure.
pub type Transform<T> = Box<dyn Fn(T) -> anyhow::Result<Option<T>> + Send + 'static>;

/// What a stage does with an item whose transform failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log the failure at error level and discard the item.
    #[default]
    Drop,
    /// Emit a tagged [`StageError`] downstream in place of the item.
    Forward,
}

/// Items travelling between stages.
type Item<T> = Result<T, StageError>;

struct PendingStage<T> {
    name: String,
    capacity: usize,
    transform: Transform<T>,
}

/// Builder for [`StagePipeline`].
pub struct PipelineBuilder<T> {
    stages: Vec<PendingStage<T>>,
    policy: ErrorPolicy,
    sink: Arc<dyn LogSink>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Append a stage with a fallible, filtering transform. `capacity` bounds
    /// the stage's input queue.
    #[must_use]
    pub fn stage<F>(mut self, name: impl Into<String>, capacity: usize, transform: F) -> Self
    where
        F: Fn(T) -> anyhow::Result<Option<T>> + Send + 'static,
    {
        self.stages.push(PendingStage {
            name: name.into(),
            capacity,
            transform: Box::new(transform),
        });
        self
    }

    /// Append a stage from an already boxed transform.
    #[must_use]
    pub fn boxed_stage(mut self, name: impl Into<String>, capacity: usize, transform: Transform<T>) -> Self {
        self.stages.push(PendingStage {
            name: name.into(),
            capacity,
            transform,
        });
        self
    }

    /// Append an infallible one-to-one stage.
    #[must_use]
    pub fn map<F>(self, name: impl Into<String>, capacity: usize, f: F) -> Self
    where
        F: Fn(T) -> T + Send + 'static,
    {
        self.stage(name, capacity, move |item| Ok(Some(f(item))))
    }

    /// Append a stage that keeps only items matching `predicate`.
    #[must_use]
    pub fn filter<F>(self, name: impl Into<String>, capacity: usize, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + 'static,
    {
        self.stage(name, capacity, move |item| Ok(predicate(&item).then_some(item)))
    }

    /// Choose how transform failures are handled. Defaults to [`ErrorPolicy::Drop`].
    #[must_use]
    pub const fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report diagnostics to `sink` instead of `tracing`.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Spawn the stage threads.
    ///
    /// # Errors
    ///
    /// `PipelineError::NoStages` for an empty builder,
    /// `PipelineError::ZeroCapacity` for a zero-capacity stage and
    /// `PipelineError::Spawn` if a thread cannot be started.
    pub fn build(self) -> Result<StagePipeline<T>, PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        if let Some(stage) = self.stages.iter().find(|s| s.capacity == 0) {
            return Err(PipelineError::ZeroCapacity(stage.name.clone()));
        }

        let inputs: Vec<BoundedQueue<Item<T>>> = self
            .stages
            .iter()
            .map(|s| BoundedQueue::new(s.capacity))
            .collect();
        let output = BoundedQueue::unbounded();
        let stage_names: Vec<String> = self.stages.iter().map(|s| s.name.clone()).collect();

        let mut handles = Vec::with_capacity(self.stages.len());
        for (index, pending) in self.stages.into_iter().enumerate() {
            let input = inputs[index].clone();
            let next = inputs.get(index + 1).cloned().unwrap_or_else(|| output.clone());
            let name = pending.name.clone();
            let worker = StageWorker {
                name: pending.name,
                transform: pending.transform,
                input,
                output: next,
                policy: self.policy,
                sink: Arc::clone(&self.sink),
            };
            let spawned = thread::Builder::new()
                .name(format!("stage-{name}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Unwind what was started: end-of-stream flows through the
                    // stages that exist.
                    inputs[0].close();
                    if let Some(queue) = inputs.get(index) {
                        queue.close();
                    }
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(PipelineError::Spawn {
                        stage: name,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.sink.record(
            LogLevel::Info,
            &format!("pipeline started with stages [{}]", stage_names.join(" -> ")),
        );

        Ok(StagePipeline {
            input: inputs[0].clone(),
            output,
            stage_names,
            handles: Mutex::new(handles),
            sink: self.sink,
        })
    }
}

struct StageWorker<T> {
    name: String,
    transform: Transform<T>,
    input: BoundedQueue<Item<T>>,
    output: BoundedQueue<Item<T>>,
    policy: ErrorPolicy,
    sink: Arc<dyn LogSink>,
}

impl<T> StageWorker<T> {
    fn run(self) {
        debug!(stage = %self.name, "stage thread started");
        let mut processed = 0_u64;

        while let Some(item) = self.input.pop() {
            let forwarded = match item {
                // Errors from upstream stages pass through untouched.
                Err(err) => Some(Err(err)),
                Ok(value) => self.apply(value),
            };
            processed += 1;
            if let Some(next) = forwarded {
                if self.output.push(next).is_err() {
                    self.sink.record(
                        LogLevel::Warning,
                        &format!("stage `{}` output closed early, stopping", self.name),
                    );
                    break;
                }
            }
        }

        self.output.close();
        debug!(stage = %self.name, processed, "stage thread exiting");
    }

    fn apply(&self, value: T) -> Option<Item<T>> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.transform)(value)));
        let message = match outcome {
            Ok(Ok(Some(out))) => return Some(Ok(out)),
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        match self.policy {
            ErrorPolicy::Drop => {
                self.sink.record(
                    LogLevel::Error,
                    &format!("stage `{}` dropped item: {message}", self.name),
                );
                None
            }
            ErrorPolicy::Forward => Some(Err(StageError {
                stage: self.name.clone(),
                message,
            })),
        }
    }
}

/// A running chain of stages.
pub struct StagePipeline<T> {
    input: BoundedQueue<Item<T>>,
    output: BoundedQueue<Item<T>>,
    stage_names: Vec<String>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    sink: Arc<dyn LogSink>,
}

impl<T: Send + 'static> StagePipeline<T> {
    /// Start describing a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder<T> {
        PipelineBuilder {
            stages: Vec::new(),
            policy: ErrorPolicy::default(),
            sink: Arc::new(TracingSink),
        }
    }
}

impl<T> StagePipeline<T> {
    /// Feed an item to the first stage, blocking while its queue is full.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Shutdown` after [`shutdown`](Self::shutdown).
    pub fn submit_item(&self, item: T) -> Result<(), PipelineError> {
        self.input.push(Ok(item)).map_err(|_| PipelineError::Shutdown)
    }

    /// Next result from the last stage, blocking until one is available.
    ///
    /// Returns `None` once the pipeline has shut down and every result has
    /// been read.
    pub fn next_output(&self) -> Option<Result<T, StageError>> {
        self.output.pop()
    }

    /// Next result if one is ready.
    pub fn try_next_output(&self) -> Option<Result<T, StageError>> {
        self.output.try_pop()
    }

    /// Read results until end of stream.
    ///
    /// Blocks until [`shutdown`](Self::shutdown) has been called (possibly
    /// from another thread) and all stages have finished.
    pub fn collect_outputs(&self) -> Vec<Result<T, StageError>> {
        std::iter::from_fn(|| self.output.pop()).collect()
    }

    /// Stage names in processing order.
    #[must_use]
    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    /// True once shutdown has started.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.input.is_closed()
    }

    /// Close the input and join every stage thread after the items already
    /// submitted have flowed through. Safe to call more than once.
    pub fn shutdown(&self) {
        let mut handles = self.handles.lock();
        if handles.is_empty() {
            return;
        }
        self.input.close();
        let current = thread::current().id();
        for handle in handles.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                self.sink.record(LogLevel::Warning, "stage thread panicked");
            }
        }
        self.sink.record(LogLevel::Info, "pipeline shut down");
    }
}

impl<T> Drop for StagePipeline<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T> fmt::Debug for StagePipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagePipeline")
            .field("stages", &self.stage_names)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Ready-made integer transforms.
pub mod stages {
    /// Multiply every item by `factor`.
    pub fn multiply(factor: i64) -> impl Fn(i64) -> i64 + Send + 'static {
        move |x| x * factor
    }

    /// Add `offset` to every item.
    pub fn add(offset: i64) -> impl Fn(i64) -> i64 + Send + 'static {
        move |x| x + offset
    }

    /// Keep only even items.
    pub fn keep_even() -> impl Fn(&i64) -> bool + Send + 'static {
        |x| x % 2 == 0
    }
}
