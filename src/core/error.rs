//! Error types for the concurrency primitives.
//!
//! Only recoverable conditions live here. Broken invariants inside a primitive
//! (a queue holding more than its capacity, a lock released more often than it
//! was acquired) are programmer errors and panic instead.

use thiserror::Error;

/// Errors produced by [`BoundedQueue`](crate::core::BoundedQueue) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue has been closed; producers should stop producing.
    #[error("queue is closed")]
    Closed,
    /// A bounded wait expired before the operation could complete.
    #[error("timed out waiting on queue")]
    Timeout,
}

/// Error returned by non-blocking or bounded pushes. The rejected item is handed
/// back to the caller.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum TryPushError<T> {
    /// The queue was at capacity.
    #[error("queue is full")]
    Full(T),
    /// The queue has been closed.
    #[error("queue is closed")]
    Closed(T),
    /// The deadline passed while the queue stayed full.
    #[error("timed out waiting for queue capacity")]
    Timeout(T),
}

impl<T> TryPushError<T> {
    /// Returns the item that could not be enqueued.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) | Self::Timeout(item) => item,
        }
    }

    /// True when the failure was caused by the queue being closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Errors that can occur when using a [`WorkerPool`](crate::core::WorkerPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool is draining or terminated and no longer accepts tasks.
    #[error("pool has been shut down")]
    PoolShutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal error (worker thread could not be spawned, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure captured inside a [`TaskFuture`](crate::core::TaskFuture).
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task body returned an error.
    #[error("task failed: {0}")]
    Failed(anyhow::Error),
    /// The task body panicked; the payload message is preserved when it is a string.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was cancelled before it started running.
    #[error("task was cancelled")]
    Cancelled,
    /// The pool dropped the task without running it.
    #[error("task was abandoned by the pool")]
    Abandoned,
    /// The outcome was already handed out by [`TaskFuture::try_take`](crate::core::TaskFuture::try_take).
    #[error("task outcome was already taken")]
    AlreadyTaken,
}

impl TaskError {
    /// True for [`TaskError::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A per-item failure raised by a pipeline stage transform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct StageError {
    /// Name of the stage whose transform failed.
    pub stage: String,
    /// Rendered failure message.
    pub message: String,
}

/// Errors produced by [`StagePipeline`](crate::core::StagePipeline) operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pipeline needs at least one stage.
    #[error("pipeline has no stages")]
    NoStages,
    /// A stage was configured with a zero capacity.
    #[error("stage `{0}` has zero capacity")]
    ZeroCapacity(String),
    /// A configured stage had no transform registered under its name.
    #[error("no transform registered for stage `{0}`")]
    UnknownTransform(String),
    /// The pipeline has been shut down.
    #[error("pipeline has been shut down")]
    Shutdown,
    /// A stage thread could not be spawned.
    #[error("failed to spawn stage `{stage}`: {message}")]
    Spawn {
        /// Stage name.
        stage: String,
        /// OS error text.
        message: String,
    },
}

/// Configuration parsing and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// An environment variable held an unparseable value.
    #[error("invalid environment variable `{name}`: {value}")]
    Env {
        /// Variable name.
        name: String,
        /// Offending value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_display() {
        assert_eq!(QueueError::Closed.to_string(), "queue is closed");
        assert_eq!(QueueError::Timeout.to_string(), "timed out waiting on queue");
    }

    #[test]
    fn test_try_push_error_returns_item() {
        let err = TryPushError::Full(7);
        assert_eq!(err.to_string(), "queue is full");
        assert!(!err.is_closed());
        assert_eq!(err.into_inner(), 7);

        let err = TryPushError::Closed("x");
        assert!(err.is_closed());
        assert_eq!(err.into_inner(), "x");
    }

    #[test]
    fn test_pool_error_display() {
        assert_eq!(PoolError::PoolShutdown.to_string(), "pool has been shut down");
        assert_eq!(
            PoolError::InvalidConfig("worker_count must be greater than 0".into()).to_string(),
            "invalid configuration: worker_count must be greater than 0"
        );
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::Failed(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "task failed: boom");
        assert!(TaskError::Cancelled.is_cancelled());
        assert_eq!(TaskError::Panicked("oops".into()).to_string(), "task panicked: oops");
        assert_eq!(TaskError::AlreadyTaken.to_string(), "task outcome was already taken");
        assert!(!TaskError::AlreadyTaken.is_cancelled());
    }

    #[test]
    fn test_stage_error_display() {
        let err = StageError {
            stage: "parse".into(),
            message: "bad input".into(),
        };
        assert_eq!(err.to_string(), "stage `parse` failed: bad input");
    }
}
