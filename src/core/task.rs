//! Task futures returned by the worker pool.
//!
//! A [`TaskFuture`] is a blocking handle to a result that a worker will produce.
//! It moves exactly once from pending to a terminal state (completed, failed or
//! cancelled). Waiting uses a `parking_lot::Condvar`; there is no polling.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::error::TaskError;

/// Public view of a future's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    /// Not finished yet (queued or running).
    Pending,
    /// The task produced a value.
    Completed,
    /// The task returned an error or panicked.
    Failed,
    /// The task was cancelled before it ran.
    Cancelled,
}

enum Slot<R> {
    Queued,
    Running,
    Completed(R),
    Failed(TaskError),
    Cancelled,
    /// The result was handed to a caller; the status before taking is kept.
    Taken(FutureStatus),
}

impl<R> Slot<R> {
    const fn status(&self) -> FutureStatus {
        match self {
            Self::Queued | Self::Running => FutureStatus::Pending,
            Self::Completed(_) => FutureStatus::Completed,
            Self::Failed(_) => FutureStatus::Failed,
            Self::Cancelled => FutureStatus::Cancelled,
            Self::Taken(status) => *status,
        }
    }

    const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }

    fn take(&mut self) -> Option<Result<R, TaskError>> {
        let status = self.status();
        match std::mem::replace(self, Self::Taken(status)) {
            Self::Completed(value) => Some(Ok(value)),
            Self::Failed(err) => Some(Err(err)),
            Self::Cancelled => Some(Err(TaskError::Cancelled)),
            other => {
                *self = other;
                None
            }
        }
    }
}

struct Shared<R> {
    slot: Mutex<Slot<R>>,
    done: Condvar,
}

/// Handle to the eventual result of a submitted task.
pub struct TaskFuture<R> {
    id: u64,
    shared: Arc<Shared<R>>,
}

/// Worker-side half of a [`TaskFuture`].
pub(crate) struct Promise<R> {
    shared: Arc<Shared<R>>,
}

/// Create a linked promise/future pair for task `id`.
pub(crate) fn promise<R>(id: u64) -> (Promise<R>, TaskFuture<R>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Queued),
        done: Condvar::new(),
    });
    (
        Promise {
            shared: Arc::clone(&shared),
        },
        TaskFuture { id, shared },
    )
}

impl<R> Promise<R> {
    /// Move the slot from queued to running. Returns false if the future was
    /// cancelled first, in which case the task body must not run.
    pub(crate) fn start(&self) -> bool {
        let mut slot = self.shared.slot.lock();
        match *slot {
            Slot::Queued => {
                *slot = Slot::Running;
                true
            }
            _ => false,
        }
    }

    /// Record the task outcome and wake all waiters.
    pub(crate) fn complete(self, outcome: Result<R, TaskError>) {
        let mut slot = self.shared.slot.lock();
        if slot.is_terminal() {
            return;
        }
        *slot = match outcome {
            Ok(value) => Slot::Completed(value),
            Err(err) => Slot::Failed(err),
        };
        drop(slot);
        self.shared.done.notify_all();
    }
}

impl<R> Drop for Promise<R> {
    fn drop(&mut self) {
        // A promise dropped without completing (pool torn down mid-flight)
        // must not leave waiters blocked forever.
        let mut slot = self.shared.slot.lock();
        if !slot.is_terminal() {
            *slot = Slot::Failed(TaskError::Abandoned);
            drop(slot);
            self.shared.done.notify_all();
        }
    }
}

impl<R> TaskFuture<R> {
    /// Pool-assigned task identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Current state of the task.
    #[must_use]
    pub fn status(&self) -> FutureStatus {
        self.shared.slot.lock().status()
    }

    /// True once the task reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.shared.slot.lock().is_terminal()
    }

    /// Cancel the task if it has not started running.
    ///
    /// Returns `true` if the task is now cancelled (including when it already
    /// was), `false` if it is running or finished.
    pub fn cancel(&self) -> bool {
        let mut slot = self.shared.slot.lock();
        match *slot {
            Slot::Queued => {
                *slot = Slot::Cancelled;
                drop(slot);
                self.shared.done.notify_all();
                true
            }
            Slot::Cancelled | Slot::Taken(FutureStatus::Cancelled) => true,
            _ => false,
        }
    }

    /// Block until the task finishes and return its outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`TaskError`] captured for a failed, panicked or cancelled
    /// task, and [`TaskError::AlreadyTaken`] if [`try_take`](Self::try_take)
    /// already handed the outcome out.
    pub fn wait(self) -> Result<R, TaskError> {
        let mut slot = self.shared.slot.lock();
        while !slot.is_terminal() {
            self.shared.done.wait(&mut slot);
        }
        slot.take().unwrap_or(Err(TaskError::AlreadyTaken))
    }

    /// Block for at most `timeout`. Returns `true` if the task reached a
    /// terminal state.
    ///
    /// A timeout too large to express as a deadline waits without one.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.shared.slot.lock();
        while !slot.is_terminal() {
            match deadline {
                Some(deadline) => {
                    if self.shared.done.wait_until(&mut slot, deadline).timed_out() {
                        return slot.is_terminal();
                    }
                }
                None => self.shared.done.wait(&mut slot),
            }
        }
        true
    }

    /// Take the outcome without blocking, if the task has finished.
    ///
    /// Returns `None` while pending, and after the outcome has been taken.
    /// A later [`wait`](Self::wait) reports [`TaskError::AlreadyTaken`].
    pub fn try_take(&self) -> Option<Result<R, TaskError>> {
        self.shared.slot.lock().take()
    }
}

#[cfg(feature = "tokio-runtime")]
impl<R: Send + 'static> TaskFuture<R> {
    /// Await the outcome from async code.
    ///
    /// The condvar wait runs on tokio's blocking thread pool so the async
    /// runtime is never stalled.
    ///
    /// # Errors
    ///
    /// Same as [`wait`](Self::wait); a failed blocking join is reported as
    /// [`TaskError::Abandoned`].
    pub async fn wait_async(self) -> Result<R, TaskError> {
        tokio::task::spawn_blocking(move || self.wait())
            .await
            .unwrap_or(Err(TaskError::Abandoned))
    }
}

impl<R> fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
